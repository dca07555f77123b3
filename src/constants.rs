//! Constants for the market data engine
//!
//! These are the compiled-in defaults. `EngineConfig::from_env` can
//! override the tunable ones at startup; endpoint URLs are fixed.

/// Time-to-live for a live quote in production (in seconds)
pub const QUOTE_TTL_SECS: u64 = 300;

/// Time-to-live for a live quote when running with `DEBUG=true` (in seconds)
pub const DEV_QUOTE_TTL_SECS: u64 = 60;

/// Time-to-live for a quote served from the static fallback table (in seconds)
///
/// Shorter than the live TTL so a recovering source is retried sooner.
pub const FALLBACK_TTL_SECS: u64 = 60;

/// Fallback TTL used with `DEBUG=true` (in seconds)
pub const DEV_FALLBACK_TTL_SECS: u64 = 30;

/// Time-to-live for historical price series (in seconds)
pub const HISTORY_TTL_SECS: u64 = 3600;

/// HTTP request timeout for quote APIs (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 8;

/// HTTP request timeout for the exchange API, which is the least reliable source (in seconds)
pub const EXCHANGE_TIMEOUT_SECS: u64 = 4;

/// Upper bound for any configured per-call timeout (in seconds)
pub const MAX_TIMEOUT_SECS: u64 = 9;

/// Grace period added on top of an adapter timeout before the chain abandons the call
pub const TIMEOUT_EPSILON_MS: u64 = 250;

/// How long a source is skipped after it reports rate limiting (in seconds)
pub const RATE_LIMIT_COOLDOWN_SECS: u64 = 60;

/// How often the background task purges expired cache entries (in seconds)
pub const CACHE_SWEEP_INTERVAL_SECS: u64 = 120;

/// Capacity of the quote event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Indices shown in the default market snapshot
pub const DEFAULT_INDICES: &[&str] = &["NIFTY", "SENSEX", "BANKNIFTY", "MIDCPNIFTY", "FINNIFTY"];

/// JSON keys whose presence in an HTTP 200 body means the primary API throttled us
pub const DEFAULT_RATE_LIMIT_KEYS: &[&str] = &["Note", "Information"];

/// Phrases in an HTTP 200 body that mean the primary API throttled us
pub const DEFAULT_RATE_LIMIT_PHRASES: &[&str] = &["API call frequency", "rate limit"];

/// Alpha Vantage query endpoint
pub const ALPHA_VANTAGE_API_URL: &str = "https://www.alphavantage.co/query";

/// Rows in an Alpha Vantage `outputsize=compact` daily series
pub const ALPHA_VANTAGE_COMPACT_POINTS: usize = 100;

/// Calendar days a compact daily series reliably reaches back
pub const ALPHA_VANTAGE_COMPACT_DAYS: i64 = 140;

/// Yahoo Finance chart API base URL
pub const YAHOO_CHART_API_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// NSE India home page, visited once to obtain session cookies
pub const NSE_HOME_URL: &str = "https://www.nseindia.com";

/// NSE India equity quote endpoint
pub const NSE_QUOTE_EQUITY_URL: &str = "https://www.nseindia.com/api/quote-equity";

/// NSE India all-indices endpoint
pub const NSE_ALL_INDICES_URL: &str = "https://www.nseindia.com/api/allIndices";

/// AMFI NAV mirror used for mutual fund schemes
pub const MFAPI_URL: &str = "https://api.mfapi.in/mf";

/// Google Finance quote page base URL
pub const GOOGLE_FINANCE_URL: &str = "https://www.google.com/finance/quote";

/// Maximum number of NAV observations returned for a fund history
pub const MAX_NAV_HISTORY_DAYS: usize = 1095;

/// User agent for API requests
pub const USER_AGENT: &str = "market-data-engine/0.1.0";

/// Browser user agent for endpoints that reject non-browser clients
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
