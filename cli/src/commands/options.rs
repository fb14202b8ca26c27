use std::sync::Arc;

use anyhow::{bail, Context};
use caravan_core::{
    ApiClient, MemoryField, RemoteOptionSource, SelectOption, SelectionConfig, SelectionField,
};
use serde_json::Value;
use tracing::debug;

use crate::{
    app_config::AppConfig,
    args::OptionsArgs,
    formatters::{print_options, OptionListing},
};

pub async fn options_cmd(config: &AppConfig, args: OptionsArgs) -> anyhow::Result<()> {
    let client = ApiClient::new(config.client_config()).context("Failed to build HTTP client")?;
    let source = RemoteOptionSource::new(
        Arc::new(client),
        args.endpoint.as_str(),
        config.request_context(),
    );

    let mut selection =
        SelectionConfig::new(args.endpoint.as_str()).page_size(args.limit.unwrap_or(config.page_size));
    for (name, value) in &args.params {
        selection = selection.param(name, value);
    }

    let form = Arc::new(MemoryField::default());
    let field: SelectionField<Value> = SelectionField::new(Arc::new(source), selection, form);
    if let Some((value, label)) = &args.selected {
        field.set_initial_option(Some(SelectOption::new(value.as_str(), label.as_str())));
    }
    if let Some(search) = &args.search {
        field.submit_search(search).await;
    }

    field.open().await;
    while field.page_count() < args.pages as usize && field.has_more() {
        debug!("Loading page {} of {}", field.page_count() + 1, args.endpoint);
        if !field.fetch_next_page().await {
            break;
        }
    }

    if field.page_count() == 0 {
        bail!("Failed to load options from {}", args.endpoint);
    }

    let options = field.options();
    let selected = field.selected().map(|option| option.value);
    let listing = OptionListing {
        options: &options,
        selected: selected.as_ref(),
        pages: field.page_count(),
        has_more: field.has_more(),
        total_count: field.total_count(),
    };
    print_options(&listing, &args.output)?;

    field.dispose();
    Ok(())
}
