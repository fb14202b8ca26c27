use anyhow::Context;
use caravan_core::{ApiClient, ApiResult, CacheDirective, RequestBody, RequestOptions};
use serde_json::Value;
use tracing::debug;

use crate::{
    app_config::AppConfig,
    args::RequestArgs,
    formatters::{print_failure, print_json},
};

/// Returns whether the backend reported success
pub async fn request_cmd(config: &AppConfig, args: RequestArgs) -> anyhow::Result<bool> {
    let client = ApiClient::new(config.client_config()).context("Failed to build HTTP client")?;

    let body = args
        .body
        .as_deref()
        .map(serde_json::from_str::<Value>)
        .transpose()
        .context("Request body is not valid JSON")?
        .map(RequestBody::Json);

    let options = build_options(&args);
    debug!("Sending {:?} {}", args.method, args.endpoint);

    let result = client
        .execute(
            &args.endpoint,
            args.method,
            body,
            &config.request_context(),
            &options,
        )
        .await;

    print_json(&result)?;
    if let ApiResult::Failure(failure) = &result {
        print_failure(failure)?;
    }

    Ok(result.is_success())
}

fn build_options(args: &RequestArgs) -> RequestOptions {
    let mut options = RequestOptions::default();
    if args.skip_auth {
        options = options.skip_auth();
    }
    if args.no_store {
        options = options.cache(CacheDirective::NoStore);
    }
    for (name, value) in &args.headers {
        options = options.header(name, value);
    }
    for tag in &args.tag {
        options = options.tag(tag);
    }
    options
}
