use crate::{app_config::AppConfig, formatters::print_json};

pub fn config_cmd(config: &AppConfig) -> anyhow::Result<()> {
    print_json(config)
}
