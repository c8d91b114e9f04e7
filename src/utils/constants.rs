//! Constants Module - Single Source of Truth
//!
//! Every threshold, weight, endpoint and default used by the tracing
//! pipeline lives here. Other modules import from this file instead of
//! hardcoding numbers.

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "RusterTrace";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for HTTP requests
pub const USER_AGENT: &str = concat!("RusterTrace/", env!("CARGO_PKG_VERSION"));

// ============================================
// ADDRESS FORMAT
// ============================================

/// Every TRON base58 address starts with this character
pub const ADDRESS_PREFIX: char = 'T';

/// Total length of a TRON base58 address
pub const ADDRESS_LEN: usize = 34;

/// Characters kept when shortening an address for warnings and logs
pub const ADDRESS_SHORT_LEN: usize = 12;

// ============================================
// TOKEN
// ============================================

/// USDT TRC20 contract
pub const USDT_CONTRACT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

/// USDT minor units per whole token (6 decimals)
pub const TOKEN_UNIT: f64 = 1_000_000.0;

// ============================================
// LEDGER API
// ============================================

/// TronGrid REST base URL
pub const TRONGRID_BASE_URL: &str = "https://api.trongrid.io";

/// TronScan API base URL
pub const TRONSCAN_BASE_URL: &str = "https://apilist.tronscanapi.com/api";

/// Header carrying the TronGrid API key
pub const TRONGRID_API_KEY_HEADER: &str = "TRON-PRO-API-KEY";

/// Largest page TronGrid will serve
pub const MAX_PAGE_SIZE: usize = 200;

/// HTTP timeout for ledger calls (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Delay between recursive crawl fetches (milliseconds)
pub const DEFAULT_CRAWL_DELAY_MS: u64 = 150;

/// Delay between pages of one paginated fetch (milliseconds)
pub const DEFAULT_PAGE_DELAY_MS: u64 = 200;

/// Delay between risk-status lookups (milliseconds)
pub const DEFAULT_LOOKUP_DELAY_MS: u64 = 100;
pub const DEFAULT_CLASSIFICATION_DELAY_MS: u64 = 50;

/// TTL for cached pass-through lookups served by the API (seconds)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

// ============================================
// CRAWL LIMITS
// ============================================

/// Smallest accepted analysis depth
pub const MIN_ANALYSIS_DEPTH: usize = 1;

/// Largest accepted analysis depth
pub const MAX_ANALYSIS_DEPTH: usize = 5;

/// Default crawl depth
pub const DEFAULT_MAX_DEPTH: usize = 2;

/// Transfers fetched per address during the crawl
pub const DEFAULT_MAX_TRANSACTIONS_PER_ADDRESS: usize = 200;

/// Exchange addresses whose history may be fetched in one run
pub const DEFAULT_MAX_EXCHANGE_LOOKUP: usize = 50;

/// Addresses whose history may be fetched in one run
pub const DEFAULT_MAX_ADDRESSES_TO_EXPLORE: usize = 200;

/// Counterparties followed from a single address
pub const DEFAULT_MAX_CONNECTIONS_PER_ADDRESS: usize = 30;

/// Direct neighbours of source/target re-expanded after the seed crawls
pub const DEFAULT_MAX_NEIGHBORS_TO_EXPAND: usize = 5;

// ============================================
// PATH SEARCH
// ============================================

/// Edges below this aggregated amount are ignored by path search
pub const DEFAULT_MIN_TRANSACTION_AMOUNT: f64 = 10.0;

/// Nodes with more neighbours than this are treated as hubs and never expanded
pub const DEFAULT_MAX_NODE_CONNECTIONS: usize = 500;

/// Exchanges may only be used as hops while the visited set is this small
pub const DEFAULT_EXCHANGE_BOOTSTRAP_SIZE: usize = 10;

/// Paths returned by the primary search
pub const DEFAULT_MAX_PATHS: usize = 20;

/// Paths returned by the common-neighbour fallback
pub const DEFAULT_MAX_EXTENDED_PATHS: usize = 10;

// ============================================
// GRAPH ANALYTICS
// ============================================

/// PageRank power iterations
pub const PAGERANK_ITERATIONS: usize = 15;

/// PageRank damping factor
pub const PAGERANK_DAMPING: f64 = 0.85;

/// Lowest k tested by the k-core pass
pub const KCORE_MIN_K: usize = 1;

/// k-core thresholds are tested up to (excluding) this value
pub const KCORE_CEILING: usize = 10;

/// Label propagation sweeps
pub const LABEL_PROPAGATION_ITERATIONS: usize = 20;

/// Key addresses computed per run
pub const DEFAULT_KEY_ADDRESS_COUNT: usize = 20;

/// Key addresses reported and checked per run
pub const DEFAULT_REPORTED_KEY_ADDRESSES: usize = 15;

/// Communities of this size or smaller are labelled "Small Community"
pub const SMALL_COMMUNITY_SIZE: usize = 3;

/// Ratio above which a community is named after its hot/cold members
pub const DOMINANT_CATEGORY_RATIO: f64 = 0.5;

// ============================================
// BEHAVIOR CLASSIFICATION
// ============================================

/// Transfers fetched (both directions) to classify one address
pub const DEFAULT_CLASSIFICATION_HISTORY: usize = 200;

/// Milliseconds per minute
pub const MS_PER_MINUTE: f64 = 60_000.0;

/// Milliseconds per day
pub const MS_PER_DAY: f64 = 86_400_000.0;

/// One week in minutes (cold-wallet gap threshold)
pub const WEEK_MINUTES: f64 = 10_080.0;

/// Flat score awarded to "common" when neither hot nor cold stands out
pub const COMMON_BASE_SCORE: u32 = 5;

/// Hot score must stay below this for "common" to score
pub const COMMON_HOT_FLOOR: u32 = 3;

/// Cold score must stay below this for "common" to score
pub const COMMON_COLD_FLOOR: u32 = 2;

// ============================================
// RISK WEIGHTS
// ============================================

pub const WEIGHT_BLACKLIST: f64 = 50.0;
pub const WEIGHT_SANCTIONS: f64 = 45.0;
pub const WEIGHT_MIXER: f64 = 40.0;
pub const WEIGHT_KNOWN_SCAM: f64 = 35.0;
pub const WEIGHT_VELOCITY: f64 = 25.0;
pub const WEIGHT_STRUCTURING: f64 = 22.0;
pub const WEIGHT_HIGH_CONNECTIVITY: f64 = 18.0;
pub const WEIGHT_PATH_COMPLEXITY: f64 = 15.0;
pub const WEIGHT_VOLUME_ANOMALY: f64 = 12.0;
pub const WEIGHT_EXCHANGE_RISK: f64 = 8.0;
pub const WEIGHT_HOT_WALLET: f64 = 5.0;

/// Share of the blacklist weight for a direct neighbour of a risky address
pub const PROXIMITY_DIRECT_FACTOR: f64 = 0.8;

/// Share of the blacklist weight for an address two hops from a risky address
pub const PROXIMITY_TWO_HOP_FACTOR: f64 = 0.4;

/// Cap on any single component and on the total score
pub const MAX_RISK_SCORE: f64 = 100.0;

/// Total edge transfer count above which the path is flagged for velocity
pub const VELOCITY_TRANSFER_THRESHOLD: u64 = 30;

/// Amount bands just under round thresholds ([low, high))
pub const STRUCTURING_BANDS: [(f64, f64); 2] = [(9_000.0, 10_000.0), (90_000.0, 100_000.0)];

/// Edges in a structuring band needed to flag the path
pub const STRUCTURING_MIN_EDGES: usize = 3;

/// Degree above which an address counts as high-activity
pub const HIGH_ACTIVITY_DEGREE: usize = 50;

/// Exchanges on a path that suggest layering
pub const LAYERING_EXCHANGE_COUNT: usize = 3;

/// Contribution of a single exchange on the path (legitimate-use signal)
pub const SINGLE_EXCHANGE_CREDIT: f64 = -5.0;

/// Hop count that triggers the full complexity weight
pub const COMPLEX_PATH_HOPS: usize = 6;

/// Hop count that triggers half the complexity weight
pub const MODERATE_PATH_HOPS: usize = 4;

/// Volume tier for a single very large movement
pub const VOLUME_VERY_LARGE: f64 = 1_000_000.0;

/// Volume tier for a single large movement
pub const VOLUME_LARGE: f64 = 100_000.0;

/// Extra risk for paths mixing every wallet category
pub const MIXED_WALLET_ADJUSTMENT: f64 = 3.0;

// ============================================
// RISK BANDS (inclusive lower edge)
// ============================================

pub const BAND_CRITICAL: f64 = 70.0;
pub const BAND_HIGH: f64 = 50.0;
pub const BAND_MEDIUM: f64 = 30.0;
pub const BAND_LOW_MEDIUM: f64 = 15.0;

// ============================================
// ANALYSIS ORCHESTRATION
// ============================================

/// Distinct addresses whose risk status is looked up per run
pub const DEFAULT_MAX_RISK_CHECKS: usize = 30;

/// Leading addresses of each path included in risk-status lookups
pub const PATH_PREFIX_CHECKS: usize = 5;

/// Wallet ratings included in the report
pub const REPORTED_WALLET_RATINGS: usize = 20;

/// Importance above which an address counts as significant
pub const SIGNIFICANT_IMPORTANCE: f64 = 0.001;

/// Starting point of the 0-100 wallet rating
pub const WALLET_RATING_BASE: i32 = 50;

// ============================================
// SERVER
// ============================================

/// Default API port
pub const DEFAULT_API_PORT: u16 = 5001;

/// Default upper bound on a single analysis request (seconds)
pub const DEFAULT_ANALYSIS_TIMEOUT_SECS: u64 = 3600;

// ============================================
// HELPERS
// ============================================

/// Convert integer token minor units to whole tokens
#[inline]
pub fn minor_units_to_amount(raw: u128) -> f64 {
    raw as f64 / TOKEN_UNIT
}

/// Check if an amount sits just under a round reporting threshold
pub fn in_structuring_band(amount: f64) -> bool {
    STRUCTURING_BANDS
        .iter()
        .any(|(low, high)| amount >= *low && amount < *high)
}
