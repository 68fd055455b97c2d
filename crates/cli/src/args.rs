//! Command-line flags.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Human-readable lines.
    Text,
}

/// Relays GitLab hook deliveries onto message bus topics.
#[derive(Debug, Parser)]
#[command(name = "hook-delivery", version, about)]
pub struct Args {
    /// Port the hook endpoint listens on.
    #[arg(long, env = "HOOK_DELIVERY_PORT", default_value_t = 8888)]
    pub port: u16,

    /// Path to the routing configuration (YAML). Watched for changes.
    #[arg(
        long,
        env = "HOOK_DELIVERY_CONFIG_FILE",
        default_value = "/etc/hook-delivery/config.yaml"
    )]
    pub config_file: PathBuf,

    /// Path to the file containing the hook secret token.
    #[arg(long, env = "HOOK_DELIVERY_HMAC_SECRET_FILE", default_value = "/etc/webhook/hmac")]
    pub hmac_secret_file: PathBuf,

    /// Comma-separated message bus server addresses.
    #[arg(long, env = "HOOK_DELIVERY_NATS_SERVERS")]
    pub nats_servers: String,

    /// Connection name reported to the message bus.
    #[arg(long, env = "HOOK_DELIVERY_CLIENT_NAME", default_value = "robot-gitlab-hook-delivery")]
    pub client_name: String,

    /// Seconds to wait for open HTTP requests to finish on shutdown.
    #[arg(long, env = "HOOK_DELIVERY_GRACE_PERIOD", default_value_t = 180)]
    pub grace_period: u64,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,

    /// OTLP (gRPC) endpoint for trace export. Tracing export is off when unset.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

impl Args {
    /// Grace period for in-flight HTTP requests.
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn defaults_apply() {
        let args =
            Args::try_parse_from(["hook-delivery", "--nats-servers", "nats://10.0.0.1:4222"])
                .unwrap();

        assert_eq!(args.port, 8888);
        assert_eq!(args.config_file, PathBuf::from("/etc/hook-delivery/config.yaml"));
        assert_eq!(args.hmac_secret_file, PathBuf::from("/etc/webhook/hmac"));
        assert_eq!(args.grace_period(), Duration::from_secs(180));
        assert_eq!(args.log_format, LogFormat::Json);
    }

    #[test]
    fn overrides_apply() {
        let args = Args::try_parse_from([
            "hook-delivery",
            "--nats-servers",
            "nats://10.0.0.1:4222",
            "--port",
            "9000",
            "--log-format",
            "text",
            "--grace-period",
            "5",
        ])
        .unwrap();

        assert_eq!(args.port, 9000);
        assert_eq!(args.log_format, LogFormat::Text);
        assert_eq!(args.grace_period(), Duration::from_secs(5));
    }
}
