//! Tests for main.rs functionality

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::*;
    use clap::Parser;
    use pingmon::public_ip::PublicIpProvider;
    use pingmon::socket::SocketMode;
    use pingmon::ProbeStats;
    use std::time::Duration;

    #[test]
    fn test_get_version() {
        let version = get_version();
        assert!(!version.is_empty());

        #[cfg(debug_assertions)]
        assert!(version.ends_with("-UNRELEASED"));

        #[cfg(not(debug_assertions))]
        assert!(!version.contains("UNRELEASED"));
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(
            parse_target("gw=192.168.1.1").unwrap(),
            ("gw".to_string(), "192.168.1.1".to_string())
        );
        assert_eq!(
            parse_target(" dns = one.one.one.one ").unwrap(),
            ("dns".to_string(), "one.one.one.one".to_string())
        );
        // Only the first '=' separates name from host
        assert_eq!(parse_target("a=b=c").unwrap().1, "b=c");

        assert!(parse_target("192.168.1.1").is_err());
        assert!(parse_target("=192.168.1.1").is_err());
        assert!(parse_target("gw=").is_err());
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["pingmon", "--target", "gw=192.168.1.1"]).unwrap();
        assert_eq!(args.targets.len(), 1);
        assert_eq!(args.tick_interval_ms, 100);
        assert_eq!(args.tick_budget_ms, 500);
        assert_eq!(args.probe_timeout_ms, 1000);
        assert_eq!(args.rounds, 0);
        assert_eq!(args.whatsmyip_url, PublicIpProvider::AwsCheckIp.url());
        assert!(args.public_target.is_none());
        assert!(!args.json);
    }

    #[test]
    fn test_args_repeated_targets() {
        let args = Args::try_parse_from([
            "pingmon",
            "-t",
            "gw=192.168.1.1",
            "-t",
            "dns=1.1.1.1",
            "--public-target",
            "wan",
            "-n",
            "3",
            "-vv",
        ])
        .unwrap();
        assert_eq!(args.targets[1], ("dns".to_string(), "1.1.1.1".to_string()));
        assert_eq!(args.public_target.as_deref(), Some("wan"));
        assert_eq!(args.rounds, 3);
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_args_reject_malformed_target() {
        assert!(Args::try_parse_from(["pingmon", "--target", "nohost"]).is_err());
    }

    #[test]
    fn test_monitor_config_from_args() {
        let args = Args::try_parse_from([
            "pingmon",
            "-t",
            "gw=192.168.1.1",
            "--tick-budget-ms",
            "250",
            "--probe-timeout-ms",
            "800",
        ])
        .unwrap();
        let config = monitor_config(&args).unwrap();
        assert_eq!(config.tick_budget, Duration::from_millis(250));
        assert_eq!(config.probe_timeout, Duration::from_millis(800));

        let args =
            Args::try_parse_from(["pingmon", "-t", "gw=192.168.1.1", "--probe-timeout-ms", "0"])
                .unwrap();
        assert!(monitor_config(&args).is_err());
    }

    #[test]
    fn test_format_row() {
        let up = JsonTarget {
            id: "gw".to_string(),
            stats: ProbeStats {
                sent: 4,
                lost: 1,
                loss_percent: 25.0,
                avg_rtt_ms: 20,
                avg_ttl: 58,
            },
        };
        let row = format_row(&up);
        assert!(row.starts_with("gw"));
        assert!(row.contains("25.0%"));
        assert!(row.contains("20 ms"));
        assert!(row.contains("ttl 58"));

        let down = JsonTarget {
            id: "wan".to_string(),
            stats: ProbeStats {
                sent: 3,
                lost: 3,
                loss_percent: 100.0,
                avg_rtt_ms: 999,
                avg_ttl: 0,
            },
        };
        let row = format_row(&down);
        assert!(row.contains("100.0%"));
        assert!(row.ends_with("down"));
    }

    #[test]
    fn test_json_target_flattens_stats() {
        let row = JsonTarget {
            id: "gw".to_string(),
            stats: ProbeStats {
                sent: 4,
                lost: 0,
                loss_percent: 0.0,
                avg_rtt_ms: 5,
                avg_ttl: 64,
            },
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["id"], "gw");
        assert_eq!(value["sent"], 4);
        assert_eq!(value["avg_rtt_ms"], 5);
        assert_eq!(value["avg_ttl"], 64);
    }

    #[test]
    fn test_socket_mode_arg_conversion() {
        assert_eq!(SocketMode::from(SocketModeArg::Raw), SocketMode::Raw);
        assert_eq!(SocketMode::from(SocketModeArg::Dgram), SocketMode::Dgram);
    }
}
