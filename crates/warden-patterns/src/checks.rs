//! File security checks.
//!
//! Each check is a pure function of (path, operation) and acts as a veto:
//! a failed check carries a reason and a violation type. The default set
//! runs in the order of [`DEFAULT_CHECKS`].

use serde::Serialize;
use tracing::warn;

use warden_contracts::operation::OperationType;
use warden_core::glob;

/// Outcome of one security check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityCheck {
    pub passed: bool,
    pub reason: Option<String>,
    pub violation_type: Option<String>,
}

impl SecurityCheck {
    pub fn pass() -> Self {
        Self {
            passed: true,
            reason: None,
            violation_type: None,
        }
    }

    pub fn fail(violation_type: &str, reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: Some(reason.into()),
            violation_type: Some(violation_type.to_string()),
        }
    }
}

pub type SecurityCheckFn = fn(&str, OperationType) -> SecurityCheck;

/// The checks run by a security-validated pattern unless configured otherwise.
pub const DEFAULT_CHECKS: &[SecurityCheckFn] = &[
    check_path_traversal,
    check_system_path,
    check_credential_file,
    check_executable,
    check_dependency_directory,
    check_network_config,
    check_suspicious_filename,
    check_critical_config,
];

// ── Curated lists ─────────────────────────────────────────────────────────────

const SYSTEM_PATHS: &[&str] = &[
    "/etc/**",
    "/bin/**",
    "/sbin/**",
    "/usr/bin/**",
    "/usr/sbin/**",
    "/boot/**",
    "/sys/**",
    "/proc/**",
    "/dev/**",
    "C:/Windows/**",
    "C:/Program Files/**",
    "C:/Program Files (x86)/**",
];

const CREDENTIAL_NAMES: &[&str] = &[
    ".env",
    ".env.*",
    "*.pem",
    "*.key",
    "*.p12",
    "*.pfx",
    "id_rsa",
    "id_dsa",
    "id_ecdsa",
    "id_ed25519",
    ".npmrc",
    ".pypirc",
    ".netrc",
    ".htpasswd",
    "credentials",
    "credentials.json",
    "secrets.*",
];

const EXECUTABLE_EXTENSIONS: &[&str] = &[
    "exe", "bat", "cmd", "com", "msi", "ps1", "sh", "bash", "app", "bin", "run",
];

const NATIVE_BINARY_EXTENSIONS: &[&str] = &["exe", "dll", "so", "dylib", "bin"];

const DEPENDENCY_DIRS: &[&str] = &[
    "node_modules",
    "vendor",
    "target",
    ".venv",
    "venv",
    "__pycache__",
];

const NETWORK_CONFIG: &[&str] = &[
    "/etc/hosts",
    "/etc/hostname",
    "/etc/resolv.conf",
    "/etc/network/**",
    "/etc/netplan/**",
    "/etc/NetworkManager/**",
    "**/.ssh/config",
    "**/.ssh/known_hosts",
    "**/.ssh/authorized_keys",
    "**/*.ovpn",
    "**/wpa_supplicant.conf",
];

const CRITICAL_CONFIG_NAMES: &[&str] = &[
    "package.json",
    "package-lock.json",
    "yarn.lock",
    "Cargo.toml",
    "Cargo.lock",
    "tsconfig.json",
    "pyproject.toml",
    "requirements.txt",
    "go.mod",
    "go.sum",
    "Dockerfile",
    "docker-compose.yml",
    "Makefile",
    ".gitignore",
];

const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "jpg", "jpeg", "png", "gif", "zip",
    "mp3", "mp4",
];

const DECEPTIVE_EXTENSIONS: &[&str] = &["exe", "scr", "bat", "cmd", "com", "pif", "js", "vbs"];

const RIGHT_TO_LEFT_OVERRIDE: char = '\u{202E}';

// ── Path helpers ──────────────────────────────────────────────────────────────

/// Decode `%XX` escapes. Invalid escapes are kept verbatim.
fn percent_decode(path: &str) -> String {
    let bytes = path.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(value) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(['/', '\\']).filter(|s| !s.is_empty())
}

fn file_name(path: &str) -> &str {
    segments(path).last().unwrap_or("")
}

fn extensions(name: &str) -> Vec<String> {
    name.split('.')
        .skip(1)
        .map(|e| e.to_ascii_lowercase())
        .collect()
}

fn first_match<'a>(list: &'a [&'a str], path: &str) -> Option<&'a str> {
    let normalized = glob::normalize_path(path);
    list.iter().copied().find(|pattern| {
        glob::matches(pattern, &normalized)
            || glob::matches(pattern, normalized.trim_start_matches('/'))
    })
}

fn name_matches<'a>(list: &'a [&'a str], name: &str) -> Option<&'a str> {
    list.iter().copied().find(|pattern| glob::matches(pattern, name))
}

// ── Checks ────────────────────────────────────────────────────────────────────

/// Reject `..` segments, including percent-encoded ones.
pub fn check_path_traversal(path: &str, _operation: OperationType) -> SecurityCheck {
    let decoded = percent_decode(path);
    if segments(path).any(|s| s == "..") || segments(&decoded).any(|s| s == "..") {
        return SecurityCheck::fail(
            "path_traversal",
            format!("Path traversal detected in '{}'", path),
        );
    }
    SecurityCheck::pass()
}

/// Block mutating operations under operating-system directories.
pub fn check_system_path(path: &str, operation: OperationType) -> SecurityCheck {
    if !operation.is_mutating() {
        return SecurityCheck::pass();
    }
    match first_match(SYSTEM_PATHS, path) {
        Some(pattern) => SecurityCheck::fail(
            "system_path",
            format!("Modification of system path '{}' is blocked ({})", path, pattern),
        ),
        None => SecurityCheck::pass(),
    }
}

/// Block writes to credential-looking files. Reads pass but are logged.
pub fn check_credential_file(path: &str, operation: OperationType) -> SecurityCheck {
    let name = file_name(path);
    let Some(pattern) = name_matches(CREDENTIAL_NAMES, name) else {
        return SecurityCheck::pass();
    };

    if operation.is_mutating() {
        return SecurityCheck::fail(
            "credential_file",
            format!("Writing credential file '{}' is blocked ({})", path, pattern),
        );
    }
    warn!(path = %path, operation = %operation, "credential file accessed");
    SecurityCheck::pass()
}

/// Block direct execution of executables and writes that create native
/// binaries.
pub fn check_executable(path: &str, operation: OperationType) -> SecurityCheck {
    let exts = extensions(file_name(path));
    let Some(ext) = exts.last() else {
        return SecurityCheck::pass();
    };

    if operation == OperationType::Execute && EXECUTABLE_EXTENSIONS.contains(&ext.as_str()) {
        return SecurityCheck::fail(
            "executable",
            format!("Direct execution of '{}' is blocked", path),
        );
    }
    if matches!(operation, OperationType::WriteFile | OperationType::EditFile)
        && NATIVE_BINARY_EXTENSIONS.contains(&ext.as_str())
    {
        return SecurityCheck::fail(
            "executable",
            format!("Writing native binary '{}' is blocked", path),
        );
    }
    SecurityCheck::pass()
}

/// Block mutating operations inside package-manager and build output
/// directories.
pub fn check_dependency_directory(path: &str, operation: OperationType) -> SecurityCheck {
    if !operation.is_mutating() {
        return SecurityCheck::pass();
    }
    let normalized = glob::normalize_path(path);
    let in_dependency_dir = segments(&normalized).any(|s| DEPENDENCY_DIRS.contains(&s))
        || normalized.contains(".cargo/registry");
    if in_dependency_dir {
        return SecurityCheck::fail(
            "dependency_directory",
            format!("Modifying dependency directory content '{}' is blocked", path),
        );
    }
    SecurityCheck::pass()
}

/// Block mutating operations on network configuration.
pub fn check_network_config(path: &str, operation: OperationType) -> SecurityCheck {
    if !operation.is_mutating() {
        return SecurityCheck::pass();
    }
    match first_match(NETWORK_CONFIG, path) {
        Some(_) => SecurityCheck::fail(
            "network_config",
            format!("Modifying network configuration '{}' is blocked", path),
        ),
        None => SecurityCheck::pass(),
    }
}

/// Flag file names commonly used to disguise malicious content.
pub fn check_suspicious_filename(path: &str, operation: OperationType) -> SecurityCheck {
    if !operation.is_mutating() {
        return SecurityCheck::pass();
    }

    if path.chars().any(|c| c.is_control()) {
        return SecurityCheck::fail("suspicious_filename", "File name contains control characters");
    }
    if path.contains(RIGHT_TO_LEFT_OVERRIDE) {
        return SecurityCheck::fail(
            "suspicious_filename",
            "File name contains a right-to-left override character",
        );
    }
    for segment in segments(path) {
        if segment.len() > 255 {
            return SecurityCheck::fail(
                "suspicious_filename",
                "Path component exceeds 255 bytes",
            );
        }
        if segment != "." && segment != ".." && (segment.ends_with('.') || segment.ends_with(' ')) {
            return SecurityCheck::fail(
                "suspicious_filename",
                format!("Path component '{}' ends with a dot or space", segment),
            );
        }
    }

    let exts = extensions(file_name(path));
    if let [.., inner, outer] = exts.as_slice() {
        if DOCUMENT_EXTENSIONS.contains(&inner.as_str()) && DECEPTIVE_EXTENSIONS.contains(&outer.as_str()) {
            return SecurityCheck::fail(
                "suspicious_filename",
                format!("Deceptive double extension '.{}.{}'", inner, outer),
            );
        }
    }
    SecurityCheck::pass()
}

/// Block deletion of build manifests, lockfiles, and repository metadata.
pub fn check_critical_config(path: &str, operation: OperationType) -> SecurityCheck {
    if operation != OperationType::DeleteFile {
        return SecurityCheck::pass();
    }
    let name = file_name(path);
    let critical = CRITICAL_CONFIG_NAMES.contains(&name) || segments(path).any(|s| s == ".git");
    if critical {
        return SecurityCheck::fail(
            "critical_config",
            format!("Deleting critical configuration '{}' is blocked", path),
        );
    }
    SecurityCheck::pass()
}

/// Run `checks` in order and return the first failure.
pub fn run_checks(checks: &[SecurityCheckFn], path: &str, operation: OperationType) -> Option<SecurityCheck> {
    checks
        .iter()
        .map(|check| check(path, operation))
        .find(|outcome| !outcome.passed)
}
