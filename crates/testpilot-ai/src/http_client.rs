use std::time::Duration;

use reqwest::Client;

const DISABLE_SYSTEM_PROXY_ENV: &str = "TESTPILOT_DISABLE_SYSTEM_PROXY";
const REQUEST_TIMEOUT_SECS: u64 = 180;

pub(crate) fn build_http_client() -> Client {
    let mut builder = Client::builder().timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS));
    if should_disable_system_proxy() {
        builder = builder.no_proxy();
    }

    match builder.build() {
        Ok(client) => client,
        Err(err) => {
            tracing::warn!(error = %err, "Falling back to default HTTP client");
            Client::new()
        }
    }
}

fn should_disable_system_proxy() -> bool {
    if std::env::var_os(DISABLE_SYSTEM_PROXY_ENV).is_some() {
        return true;
    }

    cfg!(test)
}
