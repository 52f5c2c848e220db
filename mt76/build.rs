use esp_config::{generate_config, ConfigOption, Validator, Value};

fn main() {
    generate_config(
        "mt76",
        &[
            ConfigOption::new(
                "calibrate_interval_ms",
                "Interval of the periodic PHY calibration in milliseconds",
                Value::Integer(1000),
            )
            .constraint(Validator::PositiveInteger).stable("0.1.0"),
            ConfigOption::new(
                "wcid_spare_entries",
                "Amount of WCID entries, that can stay pinned by readers after their station was removed",
                Value::Integer(8),
            )
            .constraint(Validator::PositiveInteger).stable("0.1.0"),
        ],
        false,
        true,
    );
}
