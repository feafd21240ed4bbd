//! Demonstrates looking up quotes through a coordinator backed by the default reqwest transport
//! and an in-memory token store, against a local mock of the broker API.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
use url::Url;
// self
use quote_broker::{
	auth::{AppCredentials, CredentialSet, Environment},
	batch::INQUIRE_PRICE_PATH,
	config::CoordinatorConfig,
	coordinator::Coordinator,
	http::ReqwestHttpClient,
	store::{MemoryStore, TokenStore},
	token::TOKEN_PATH,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).header("content-type", "application/json").json_body(json!({
				"access_token": "demo-access",
				"token_type": "Bearer",
				"expires_in": 86_400,
			}));
		})
		.await;
	let quote_mock = server
		.mock_async(|when, then| {
			when.method(GET).path(INQUIRE_PRICE_PATH);
			then.status(200).json_body(json!({
				"rt_cd": "0",
				"msg_cd": "MCA00000",
				"msg1": "정상처리 되었습니다.",
				"output": {
					"stck_prpr": "71000",
					"prdy_vrss": "-500",
					"prdy_ctrt": "-0.70",
					"acml_vol": "12837465",
				},
			}));
		})
		.await;
	let credentials = CredentialSet::default().with(
		Environment::Prod,
		AppCredentials::new("demo-app-key", "demo-app-secret", Url::parse(&server.base_url())?)?,
	);
	let store: Arc<dyn TokenStore> = Arc::new(MemoryStore::default());
	let coordinator = <Coordinator<ReqwestHttpClient>>::new(
		CoordinatorConfig::new(Environment::Prod, credentials),
		store,
	)?;
	let quotes = coordinator.quotes(["005930", "000660", "005930"]).await;
	let mut symbols = quotes.keys().collect::<Vec<_>>();

	symbols.sort();

	for symbol in symbols {
		match &quotes[symbol] {
			Some(quote) => println!("{symbol}: {} ({}%).", quote.price, quote.change_rate),
			None => println!("{symbol}: unavailable."),
		}
	}

	token_mock.assert_async().await;
	quote_mock.assert_calls_async(2).await;

	Ok(())
}
