//! Custom validation functions for configuration.

use ipnetwork::IpNetwork;
use regex::Regex;
use validator::ValidationError;

/// Reject allowlist entries that would silence every source.
pub fn validate_cidr_list(cidrs: &[IpNetwork]) -> Result<(), ValidationError> {
    if cidrs.iter().any(|net| net.prefix() == 0) {
        return Err(ValidationError::new("allowlist_covers_everything"));
    }
    Ok(())
}

/// Validate a capture interface name.
pub fn validate_interface(name: &str) -> Result<(), ValidationError> {
    // Linux, BSD and Windows friendly names ("eth0", "br-1a2b", "en0.100", "Wi-Fi").
    let re = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:\- ]*$")
        .map_err(|_| ValidationError::new("invalid_regex"))?;
    if name.len() <= 64 && re.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_interface"))
    }
}

/// Validate an HTTP route used for the subscriber endpoint.
pub fn validate_route(path: &str) -> Result<(), ValidationError> {
    if path.starts_with('/') && !path.contains(char::is_whitespace) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_route"))
    }
}

/// Validate default log level.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid = ["trace", "debug", "info", "warn", "error", "off"]
        .contains(&level.to_lowercase().as_str());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_names() {
        for ok in ["eth0", "wlp3s0", "br-1a2b3c", "en0.100", "Wi-Fi", "lo"] {
            assert!(validate_interface(ok).is_ok(), "{ok}");
        }
        for bad in ["", "-eth0", "eth0;rm -rf", "eth0\n"] {
            assert!(validate_interface(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn routes() {
        assert!(validate_route("/ws/alerts").is_ok());
        assert!(validate_route("ws/alerts").is_err());
        assert!(validate_route("/ws alerts").is_err());
    }

    #[test]
    fn log_levels() {
        assert!(validate_log_level("DEBUG").is_ok());
        assert!(validate_log_level("verbose").is_err());
    }
}
