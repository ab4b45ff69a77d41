use clap::{Parser, ValueEnum};
use std::time::Duration;

/// Get Latency Bench - repeatedly reads one object and reports windowed latency percentiles
#[derive(Parser, Debug, Clone, Default)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Region of the bucket; selects the endpoint s3.<region>.amazonaws.com
    #[clap(long, default_value = "", help_heading = "Target")]
    pub region: String,

    /// Endpoint host[:port], overriding the one derived from --region
    #[clap(long, help_heading = "Target")]
    pub endpoint: Option<String>,

    /// Bucket holding the object
    #[clap(long, default_value = "", help_heading = "Target")]
    pub bucket: String,

    /// Key of the object to read
    #[clap(long, default_value = "", help_heading = "Target")]
    pub key: String,

    /// Use TLS to reach the endpoint
    #[clap(long, default_value_t = false, help_heading = "Target")]
    pub ssl: bool,

    /// Samples per summary window
    #[clap(short = 's', long, default_value_t = crate::defaults::WINDOW_SIZE)]
    pub size: usize,

    /// Number of concurrent workers
    #[clap(short = 'c', long, default_value_t = crate::defaults::CONCURRENCY)]
    pub concurrency: usize,

    /// Which request phases to measure
    #[clap(short = 'i', long, value_enum, default_value_t = InstrumentationLevel::Detailed)]
    pub instrumentation: InstrumentationLevel,

    /// Verbose output
    #[clap(short = 'v', long, default_value_t = false)]
    pub verbose: bool,

    /// Timeout for establishing a TCP connection
    #[clap(long, value_parser = parse_duration, default_value = "15s", help_heading = "Connection Pool")]
    pub dial_timeout: Duration,

    /// TCP keep-alive time on pooled connections
    #[clap(long, value_parser = parse_duration, default_value = "30s", help_heading = "Connection Pool")]
    pub keep_alive: Duration,

    /// Idle connections kept per endpoint
    #[clap(long, default_value_t = 10, help_heading = "Connection Pool")]
    pub max_idle_per_host: usize,

    /// Idle connections kept in total
    #[clap(long, default_value_t = 100, help_heading = "Connection Pool")]
    pub max_idle: usize,

    /// Close idle connections after this long
    #[clap(long, value_parser = parse_duration, default_value = "90s", help_heading = "Connection Pool")]
    pub idle_timeout: Duration,

    /// Timeout for the TLS handshake
    #[clap(long, value_parser = parse_duration, default_value = "10s", help_heading = "Connection Pool")]
    pub handshake_timeout: Duration,

    /// Wait for 100-continue before sending a request body (no effect: GET sends no body)
    #[clap(long, value_parser = parse_duration, default_value = "1s", help_heading = "Connection Pool")]
    pub expect_continue_timeout: Duration,
}

/// Granularity of per-request timing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum InstrumentationLevel {
    /// Total duration only
    #[clap(name = "coarse")]
    Coarse,

    /// Total, first byte and up-to-body durations plus slowest request ids
    #[default]
    #[clap(name = "detailed")]
    Detailed,
}

impl std::fmt::Display for InstrumentationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstrumentationLevel::Coarse => write!(f, "coarse"),
            InstrumentationLevel::Detailed => write!(f, "detailed"),
        }
    }
}

/// Parse duration from string (e.g., "10s", "5m", "1h")
pub(crate) fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    let (num_str, unit) = if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, "ms")
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, "s")
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, "m")
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, "h")
    } else {
        (s, "s") // Default to seconds
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number in duration: {}", num_str))?;
    if !num.is_finite() || num < 0.0 {
        return Err(format!("Duration must be a non-negative number: {}", num_str));
    }

    let duration = match unit {
        "ms" => Duration::from_secs_f64(num / 1000.0),
        "s" => Duration::from_secs_f64(num),
        "m" => Duration::from_secs_f64(num * 60.0),
        "h" => Duration::from_secs_f64(num * 3600.0),
        _ => return Err(format!("Invalid duration unit: {}", unit)),
    };

    Ok(duration)
}
