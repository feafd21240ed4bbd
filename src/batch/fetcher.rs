//! Upstream lookups performed on behalf of the batcher.

// self
use crate::{
	_prelude::*,
	client::{ApiClient, ApiRequest},
	http::HttpTransport,
};

/// Boxed future returned by [`QuoteFetcher::fetch`].
pub type FetchFuture<'a, V> = Pin<Box<dyn Future<Output = Result<Option<V>>> + 'a + Send>>;

/// Single-key upstream lookup used by [`RequestBatcher`](crate::batch::RequestBatcher).
///
/// `Ok(None)` means the upstream had nothing to return (quota exhausted, unknown symbol);
/// errors are logged by the batcher and resolved as `None` for that key only.
pub trait QuoteFetcher
where
	Self: 'static + Send + Sync,
{
	/// Value cached and handed back to callers.
	type Value: 'static + Clone + Send + Sync;

	/// Looks up one key.
	fn fetch<'a>(&'a self, key: &'a str) -> FetchFuture<'a, Self::Value>;
}

/// Path of the domestic stock current-price inquiry.
pub const INQUIRE_PRICE_PATH: &str = "/uapi/domestic-stock/v1/quotations/inquire-price";
/// Operation code of the domestic stock current-price inquiry.
pub const INQUIRE_PRICE_TR_ID: &str = "FHKST01010100";

/// Current-price snapshot for one domestic stock.
///
/// Numeric fields are kept as the decimal strings the broker sends.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
	/// Symbol the quote belongs to.
	#[serde(default)]
	pub symbol: String,
	/// Current price.
	#[serde(rename = "stck_prpr", default)]
	pub price: String,
	/// Change versus the previous close.
	#[serde(rename = "prdy_vrss", default)]
	pub change: String,
	/// Change rate versus the previous close, in percent.
	#[serde(rename = "prdy_ctrt", default)]
	pub change_rate: String,
	/// Accumulated volume.
	#[serde(rename = "acml_vol", default)]
	pub volume: String,
}
impl Quote {
	/// Current price as an integer, when it parses.
	pub fn price_value(&self) -> Option<i64> {
		self.price.trim().parse().ok()
	}
}

/// [`QuoteFetcher`] backed by the current-price inquiry of an [`ApiClient`].
pub struct ApiQuoteFetcher<C>
where
	C: ?Sized + HttpTransport,
{
	client: Arc<ApiClient<C>>,
	market_code: String,
}
impl<C> ApiQuoteFetcher<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a fetcher for the stock market (`J`).
	pub fn new(client: Arc<ApiClient<C>>) -> Self {
		Self { client, market_code: "J".into() }
	}

	/// Overrides the `FID_COND_MRKT_DIV_CODE` market code.
	pub fn with_market_code(mut self, market_code: impl Into<String>) -> Self {
		self.market_code = market_code.into();

		self
	}

	/// Builds the inquiry for `symbol`.
	pub fn request(&self, symbol: &str) -> ApiRequest {
		ApiRequest::get(INQUIRE_PRICE_PATH, INQUIRE_PRICE_TR_ID)
			.param("FID_COND_MRKT_DIV_CODE", self.market_code.as_str())
			.param("FID_INPUT_ISCD", symbol)
	}
}
impl<C> QuoteFetcher for ApiQuoteFetcher<C>
where
	C: ?Sized + HttpTransport,
{
	type Value = Quote;

	fn fetch<'a>(&'a self, key: &'a str) -> FetchFuture<'a, Quote> {
		Box::pin(async move {
			let Some(response) = self.client.call(&self.request(key)).await? else {
				return Ok(None);
			};

			if !response.is_success() {
				return Ok(None);
			}

			let quote = response.output::<Quote>("output")?.map(|mut quote| {
				quote.symbol = key.to_owned();

				quote
			});

			Ok(quote)
		})
	}
}
impl<C> Debug for ApiQuoteFetcher<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiQuoteFetcher")
			.field("client", &self.client)
			.field("market_code", &self.market_code)
			.finish()
	}
}
