use super::{Gateway, GatewayError};
use crate::models::{AccountSnapshot, Quote, RawRate, SymbolInfo, Timeframe, TradeRequest, TradeResult};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Client for a REST bridge running next to the trading terminal
///
/// No retries: a failed call is reported to the caller as-is.
pub struct HttpGateway {
    client: Client,
    base_url: Url,
    token: Option<String>,
    connected: AtomicBool,
}

impl HttpGateway {
    /// Create a gateway client
    ///
    /// # Arguments
    /// * `base_url` - Bridge root, e.g. "http://127.0.0.1:8228"
    /// * `token` - Optional bearer token sent with every request
    /// * `timeout` - Optional per-request timeout (none by default)
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, GatewayError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let base_url = Url::parse(base_url)
            .map_err(|e| GatewayError::Malformed(format!("gateway url {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::Malformed(format!(
                "gateway url {} cannot carry a path",
                base_url
            )));
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
            token,
            connected: AtomicBool::new(false),
        })
    }

    /// Bridge URL for `segments`, each one percent-encoded on its own so
    /// symbols like "US30#" or "EUR/USD" stay a single path segment
    fn url(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::Malformed(format!("gateway url {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn ensure_connected(&self) -> Result<(), GatewayError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(GatewayError::NotConnected)
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        self.ensure_connected()?;
        let response = self
            .authorize(self.client.get(self.url(segments)?))
            .query(query)
            .send()
            .await?;
        decode(response).await
    }

    async fn post_empty(&self, path: &str) -> Result<(), GatewayError> {
        let response = self
            .authorize(self.client.post(self.url(&[path])?))
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }
}

async fn check_status(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(GatewayError::Rejected {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
    let body = check_status(response).await?.text().await?;
    serde_json::from_str(&body).map_err(|e| GatewayError::Malformed(e.to_string()))
}

impl Gateway for HttpGateway {
    async fn connect(&self) -> Result<(), GatewayError> {
        self.post_empty("initialize").await?;
        self.connected.store(true, Ordering::SeqCst);
        tracing::info!("Connected to terminal bridge at {}", self.base_url);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), GatewayError> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.post_empty("shutdown").await?;
        tracing::info!("Terminal connection released");
        Ok(())
    }

    async fn recent_rates(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<RawRate>, GatewayError> {
        let query = [
            ("symbol", symbol.to_string()),
            ("timeframe", timeframe.to_string()),
            ("start", "0".to_string()),
            ("count", count.to_string()),
        ];
        // The bridge answers `null` when the terminal has nothing for the symbol
        let rates: Option<Vec<RawRate>> = self.get_json(&["rates"], &query).await?;
        rates.ok_or_else(|| GatewayError::NoData(symbol.to_string()))
    }

    async fn quote(&self, symbol: &str) -> Result<Quote, GatewayError> {
        let quote: Option<Quote> = self.get_json(&["symbols", symbol, "tick"], &[]).await?;
        quote.ok_or_else(|| GatewayError::NoData(symbol.to_string()))
    }

    async fn symbol_info(&self, symbol: &str) -> Result<SymbolInfo, GatewayError> {
        let info: Option<SymbolInfo> = self.get_json(&["symbols", symbol], &[]).await?;
        info.ok_or_else(|| GatewayError::NoData(symbol.to_string()))
    }

    async fn send_order(&self, request: &TradeRequest) -> Result<TradeResult, GatewayError> {
        self.ensure_connected()?;
        let response = self
            .authorize(self.client.post(self.url(&["orders"])?))
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    async fn account(&self) -> Result<AccountSnapshot, GatewayError> {
        let account: Option<AccountSnapshot> = self.get_json(&["account"], &[]).await?;
        account.ok_or_else(|| GatewayError::NoData("account".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, OrderFilling, OrderTime, OrderType, TradeAction};
    use mockito::Matcher;
    use tokio_test::{assert_err, assert_ok};

    // The returned mock must stay alive for as long as the server is used
    async fn connected_gateway(server: &mut mockito::Server) -> (HttpGateway, mockito::Mock) {
        let init = server
            .mock("POST", "/initialize")
            .with_status(200)
            .create_async()
            .await;

        let gateway = HttpGateway::new(&server.url(), None, None).unwrap();
        assert_ok!(gateway.connect().await);
        (gateway, init)
    }

    #[tokio::test]
    async fn test_calls_before_connect_are_refused() {
        let gateway = HttpGateway::new("http://127.0.0.1:1", None, None).unwrap();

        let result = gateway.account().await;
        assert!(matches!(result, Err(GatewayError::NotConnected)));
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _init = server
            .mock("POST", "/initialize")
            .with_status(503)
            .with_body("terminal not running")
            .create_async()
            .await;

        let gateway = HttpGateway::new(&server.url(), None, None).unwrap();
        let err = assert_err!(gateway.connect().await);

        assert!(matches!(
            err,
            GatewayError::Rejected { status: 503, ref message } if message == "terminal not running"
        ));
    }

    #[tokio::test]
    async fn test_recent_rates() {
        let mut server = mockito::Server::new_async().await;
        let (gateway, _init) = connected_gateway(&mut server).await;

        let mock = server
            .mock("GET", "/rates")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "GOLD".into()),
                Matcher::UrlEncoded("timeframe".into(), "M1".into()),
                Matcher::UrlEncoded("count".into(), "2".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"time": 1700000000, "open": 1990.0, "high": 1995.0, "low": 1989.0, "close": 1994.0, "tick_volume": 120, "spread": 20, "real_volume": 0},
                    {"time": 1700000060, "open": 1994.0, "high": 1998.0, "low": 1993.5, "close": 1997.2, "tick_volume": 98, "spread": 21, "real_volume": 0}
                ]"#,
            )
            .create_async()
            .await;

        let rates = gateway.recent_rates("GOLD", Timeframe::M1, 2).await.unwrap();

        mock.assert_async().await;
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[1].time, 1700000060);
        assert_eq!(rates[1].close, 1997.2);
    }

    #[tokio::test]
    async fn test_recent_rates_null_is_no_data() {
        let mut server = mockito::Server::new_async().await;
        let (gateway, _init) = connected_gateway(&mut server).await;

        let _rates = server
            .mock("GET", "/rates")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("null")
            .create_async()
            .await;

        let result = gateway.recent_rates("NOPE", Timeframe::M1, 100).await;
        assert!(matches!(result, Err(GatewayError::NoData(ref s)) if s == "NOPE"));
    }

    #[tokio::test]
    async fn test_account_and_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let _init = server
            .mock("POST", "/initialize")
            .match_header("authorization", "Bearer s3cret")
            .with_status(200)
            .create_async()
            .await;
        let _account = server
            .mock("GET", "/account")
            .match_header("authorization", "Bearer s3cret")
            .with_status(200)
            .with_body(r#"{"balance": 1000.0, "equity": 1012.5, "profit": 12.5, "currency": "USD"}"#)
            .create_async()
            .await;

        let gateway =
            HttpGateway::new(&server.url(), Some("s3cret".to_string()), None).unwrap();
        assert_ok!(gateway.connect().await);

        let account = gateway.account().await.unwrap();
        assert_eq!(account.profit, 12.5);
        assert_eq!(account.currency, "USD");
    }

    #[tokio::test]
    async fn test_garbage_body_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let (gateway, _init) = connected_gateway(&mut server).await;

        let _tick = server
            .mock("GET", "/symbols/GOLD/tick")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let result = gateway.quote("GOLD").await;
        assert!(matches!(result, Err(GatewayError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_send_order_posts_request() {
        let mut server = mockito::Server::new_async().await;
        let (gateway, _init) = connected_gateway(&mut server).await;

        let mock = server
            .mock("POST", "/orders")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "symbol": "GOLD",
                "type": "ORDER_TYPE_BUY",
                "type_filling": "ORDER_FILLING_IOC",
                "deviation": 10
            })))
            .with_status(200)
            .with_body(r#"{"retcode": 10009, "deal": 7, "order": 8, "volume": 0.15, "price": 2000.0}"#)
            .create_async()
            .await;

        let request = TradeRequest {
            action: TradeAction::Deal,
            symbol: "GOLD".to_string(),
            volume: 0.15,
            order_type: OrderType::from(Direction::Buy),
            price: 2000.0,
            deviation: 10,
            sl: 1999.0,
            tp: 2002.0,
            magic: 123456,
            comment: "pipbot".to_string(),
            type_time: OrderTime::GoodTillCancelled,
            type_filling: OrderFilling::ImmediateOrCancel,
        };

        let result = gateway.send_order(&request).await.unwrap();

        mock.assert_async().await;
        assert!(result.is_done());
        assert_eq!(result.order, 8);
    }

    #[tokio::test]
    async fn test_disconnect_only_once() {
        let mut server = mockito::Server::new_async().await;
        let (gateway, _init) = connected_gateway(&mut server).await;

        let mock = server
            .mock("POST", "/shutdown")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        assert_ok!(gateway.disconnect().await);
        assert_ok!(gateway.disconnect().await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_quote_escapes_symbol() {
        let mut server = mockito::Server::new_async().await;
        let (gateway, _init) = connected_gateway(&mut server).await;

        let mock = server
            .mock("GET", "/symbols/US30%23/tick")
            .with_status(200)
            .with_body(r#"{"bid": 38950.5, "ask": 38952.0}"#)
            .create_async()
            .await;

        let quote = gateway.quote("US30#").await.unwrap();

        mock.assert_async().await;
        assert_eq!(quote.bid, 38950.5);
        assert_eq!(quote.ask, 38952.0);
    }

    #[tokio::test]
    async fn test_symbol_info_keeps_slash_in_one_segment() {
        let mut server = mockito::Server::new_async().await;
        let (gateway, _init) = connected_gateway(&mut server).await;

        let mock = server
            .mock("GET", "/symbols/EUR%2FUSD")
            .with_status(200)
            .with_body(r#"{"name": "EUR/USD", "point": 0.00001, "digits": 5}"#)
            .create_async()
            .await;

        let info = gateway.symbol_info("EUR/USD").await.unwrap();

        mock.assert_async().await;
        assert_eq!(info.name, "EUR/USD");
        assert_eq!(info.digits, 5);
    }

    #[tokio::test]
    async fn test_base_url_path_is_kept() {
        let mut server = mockito::Server::new_async().await;
        let _init = server
            .mock("POST", "/bridge/initialize")
            .with_status(200)
            .create_async()
            .await;
        let mock = server
            .mock("GET", "/bridge/symbols/XAUUSD.m")
            .with_status(200)
            .with_body(r#"{"name": "XAUUSD.m", "point": 0.01, "digits": 2}"#)
            .create_async()
            .await;

        let gateway = HttpGateway::new(&format!("{}/bridge/", server.url()), None, None).unwrap();
        assert_ok!(gateway.connect().await);

        let info = gateway.symbol_info("XAUUSD.m").await.unwrap();

        mock.assert_async().await;
        assert_eq!(info.point, 0.01);
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let result = HttpGateway::new("not a url", None, None);
        assert!(matches!(result, Err(GatewayError::Malformed(_))));
    }
}
