//! Known service classification
//!
//! Maps well-known ports to service names and recognizes greeting banners
//! for protocols that announce themselves on connect.

/// Service name for a well-known port, if recognized.
pub fn service_for_port(port: u16) -> Option<&'static str> {
    match port {
        21 => Some("ftp"),
        22 => Some("ssh"),
        23 => Some("telnet"),
        25 => Some("smtp"),
        53 => Some("domain"),
        80 => Some("http"),
        110 => Some("pop3"),
        143 => Some("imap"),
        443 => Some("https"),
        445 => Some("microsoft-ds"),
        993 => Some("imaps"),
        995 => Some("pop3s"),
        1433 => Some("ms-sql"),
        3306 => Some("mysql"),
        3389 => Some("rdp"),
        5432 => Some("postgresql"),
        5985 => Some("winrm"),
        8080 => Some("http-alt"),
        8443 => Some("https-alt"),
        9100 => Some("jetdirect"),
        _ => None,
    }
}

/// Ports whose server speaks first; worth reading a banner from.
pub fn banner_expected(port: u16) -> bool {
    matches!(port, 21 | 22 | 25 | 110 | 143)
}

/// Classify a service from its greeting banner.
pub fn classify_banner(banner: &[u8]) -> Option<&'static str> {
    let text = String::from_utf8_lossy(banner);
    let trimmed = text.trim_start();

    if trimmed.starts_with("SSH-") {
        Some("ssh")
    } else if trimmed.starts_with("220 ") || trimmed.starts_with("220-") {
        // SMTP and FTP both greet with 220; the port disambiguates.
        Some("smtp/ftp")
    } else if trimmed.starts_with("+OK") {
        Some("pop3")
    } else if trimmed.starts_with("* OK") {
        Some("imap")
    } else if trimmed.starts_with("HTTP/") {
        Some("http")
    } else {
        None
    }
}

/// Combine port and banner knowledge into one label.
pub fn describe_service(port: u16, banner: Option<&[u8]>) -> String {
    let from_banner = banner.and_then(classify_banner);
    let name = match (from_banner, service_for_port(port)) {
        // A banner that contradicts the port wins; "smtp/ftp" resolves by port.
        (Some("smtp/ftp"), Some(by_port)) if by_port == "smtp" || by_port == "ftp" => by_port,
        (Some(by_banner), _) => by_banner,
        (None, Some(by_port)) => by_port,
        (None, None) => "unknown",
    };
    format!("{}/{}", port, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_for_common_ports() {
        assert_eq!(service_for_port(22), Some("ssh"));
        assert_eq!(service_for_port(9100), Some("jetdirect"));
        assert_eq!(service_for_port(12345), None);
    }

    #[test]
    fn test_classify_ssh_banner() {
        assert_eq!(classify_banner(b"SSH-2.0-OpenSSH_9.6\r\n"), Some("ssh"));
    }

    #[test]
    fn test_classify_smtp_banner() {
        assert_eq!(
            classify_banner(b"220 mail.example.com ESMTP Postfix\r\n"),
            Some("smtp/ftp")
        );
    }

    #[test]
    fn test_describe_service_resolves_greeting_by_port() {
        assert_eq!(
            describe_service(25, Some(b"220 mx1 ESMTP ready")),
            "25/smtp"
        );
        assert_eq!(describe_service(21, Some(b"220 FTP ready")), "21/ftp");
    }

    #[test]
    fn test_describe_service_unknown_port_without_banner() {
        assert_eq!(describe_service(4444, None), "4444/unknown");
    }
}
