//! Hardware fingerprinting for machine-bound licenses.
//!
//! The fingerprint is SHA-256 over seven host attributes joined with `|`:
//!
//! ```text
//! hostname|cpu model|total memory bytes|platform|arch|os type|mac,mac,...
//! ```
//!
//! It is stable across reboots but changes with a hostname change, NIC
//! replacement, RAM upgrade, OS reinstall or VM migration. Attributes that
//! cannot be read fall back to `unknown` (or `0` for memory) rather than
//! failing, so a fingerprint can always be computed.

use crate::crypto::digest::sha256_hex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::env;

const UNKNOWN: &str = "unknown";
const NULL_MAC: &str = "00:00:00:00:00:00";

/// Host attributes that feed the fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareProfile {
    /// Machine hostname.
    pub hostname: String,
    /// CPU model string of the first processor.
    pub cpu_model: String,
    /// Total physical memory in bytes.
    pub total_memory: u64,
    /// Platform (`linux`, `darwin`, `win32`, ...).
    pub platform: String,
    /// CPU architecture (`x64`, `arm64`, ...).
    pub arch: String,
    /// OS type (`Linux`, `Darwin`, `Windows_NT`, ...).
    pub os_type: String,
    /// Non-loopback MAC addresses, lowercase, sorted, de-duplicated.
    pub mac_addresses: Vec<String>,
}

impl HardwareProfile {
    /// Collect the profile of the current machine.
    #[must_use]
    pub fn collect() -> Self {
        Self {
            hostname: get_hostname(),
            cpu_model: get_cpu_model(),
            total_memory: get_total_memory(),
            platform: platform_name(env::consts::OS).to_string(),
            arch: arch_name(env::consts::ARCH).to_string(),
            os_type: os_type_name(env::consts::OS).to_string(),
            mac_addresses: normalize_macs(get_mac_addresses()),
        }
    }

    /// The pipe-joined string that is hashed.
    pub fn fingerprint_input(&self) -> String {
        [
            self.hostname.clone(),
            self.cpu_model.clone(),
            self.total_memory.to_string(),
            self.platform.clone(),
            self.arch.clone(),
            self.os_type.clone(),
            self.mac_addresses.join(","),
        ]
        .join("|")
    }

    /// Lowercase SHA-256 hex of [`fingerprint_input`](Self::fingerprint_input).
    pub fn fingerprint(&self) -> String {
        sha256_hex(self.fingerprint_input().as_bytes())
    }
}

/// Fingerprint of the current machine.
#[must_use]
pub fn hardware_fingerprint() -> String {
    HardwareProfile::collect().fingerprint()
}

/// Lowercase, drop empty and null MACs, de-duplicate, sort.
pub fn normalize_macs<I, S>(macs: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    macs.into_iter()
        .map(|m| m.as_ref().trim().to_ascii_lowercase())
        .filter(|m| !m.is_empty() && m != NULL_MAC)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn platform_name(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        "windows" => "win32",
        other => other,
    }
}

fn arch_name(arch: &str) -> &str {
    match arch {
        "x86_64" => "x64",
        "x86" => "ia32",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64",
        other => other,
    }
}

fn os_type_name(os: &str) -> &str {
    match os {
        "linux" => "Linux",
        "macos" => "Darwin",
        "windows" => "Windows_NT",
        "freebsd" => "FreeBSD",
        "openbsd" => "OpenBSD",
        "netbsd" => "NetBSD",
        other => other,
    }
}

fn get_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn get_cpu_model() -> String {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/cpuinfo")
            .ok()
            .and_then(|content| parse_cpuinfo_model(&content))
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    #[cfg(target_os = "macos")]
    {
        sysctl_value("machdep.cpu.brand_string").unwrap_or_else(|| UNKNOWN.to_string())
    }

    #[cfg(target_os = "windows")]
    {
        env::var("PROCESSOR_IDENTIFIER").unwrap_or_else(|_| UNKNOWN.to_string())
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        UNKNOWN.to_string()
    }
}

fn get_total_memory() -> u64 {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/meminfo")
            .ok()
            .and_then(|content| parse_meminfo_total(&content))
            .unwrap_or(0)
    }

    #[cfg(target_os = "macos")]
    {
        sysctl_value("hw.memsize")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        0
    }
}

fn get_mac_addresses() -> Vec<String> {
    #[cfg(target_os = "linux")]
    {
        // IFF_LOOPBACK from <net/if.h>.
        const IFF_LOOPBACK: u32 = 0x8;

        let Ok(entries) = std::fs::read_dir("/sys/class/net") else {
            return Vec::new();
        };
        entries
            .filter_map(Result::ok)
            .filter(|entry| {
                std::fs::read_to_string(entry.path().join("flags"))
                    .ok()
                    .and_then(|f| u32::from_str_radix(f.trim().trim_start_matches("0x"), 16).ok())
                    .map_or(entry.file_name() != "lo", |flags| flags & IFF_LOOPBACK == 0)
            })
            .filter_map(|entry| std::fs::read_to_string(entry.path().join("address")).ok())
            .collect()
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("ifconfig")
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .map(|out| {
                out.lines()
                    .filter_map(|l| l.trim().strip_prefix("ether "))
                    .map(|rest| rest.split_whitespace().next().unwrap_or("").to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        Vec::new()
    }
}

#[cfg(target_os = "macos")]
fn sysctl_value(name: &str) -> Option<String> {
    std::process::Command::new("sysctl")
        .args(["-n", name])
        .output()
        .ok()
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_cpuinfo_model(content: &str) -> Option<String> {
    content
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(key, _)| matches!(key.trim(), "model name" | "Model" | "cpu model" | "Processor"))
        .map(|(_, value)| value.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_meminfo_total(content: &str) -> Option<u64> {
    content
        .lines()
        .find_map(|l| l.strip_prefix("MemTotal:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine_a() -> HardwareProfile {
        HardwareProfile {
            hostname: "line-3-hmi".to_string(),
            cpu_model: "Intel(R) Core(TM) i7-8700 CPU @ 3.20GHz".to_string(),
            total_memory: 16_705_236_992,
            platform: "linux".to_string(),
            arch: "x64".to_string(),
            os_type: "Linux".to_string(),
            mac_addresses: normalize_macs(["3C:52:82:AA:01:02", "3c:52:82:aa:01:03"]),
        }
    }

    #[test]
    fn test_fingerprint_input_layout() {
        assert_eq!(
            machine_a().fingerprint_input(),
            "line-3-hmi|Intel(R) Core(TM) i7-8700 CPU @ 3.20GHz|16705236992|linux|x64|Linux|\
             3c:52:82:aa:01:02,3c:52:82:aa:01:03"
        );
    }

    #[test]
    fn test_fingerprint_is_sha256_of_input() {
        let profile = machine_a();
        assert_eq!(profile.fingerprint(), sha256_hex(profile.fingerprint_input().as_bytes()));
        assert_eq!(profile.fingerprint().len(), 64);
    }

    #[test]
    fn test_fingerprint_deterministic() {
        assert_eq!(machine_a().fingerprint(), machine_a().fingerprint());
    }

    #[test]
    fn test_nic_swap_changes_fingerprint() {
        let mut b = machine_a();
        b.mac_addresses = normalize_macs(["3c:52:82:aa:01:02", "3c:52:82:aa:09:09"]);
        assert_ne!(machine_a().fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_hostname_change_changes_fingerprint() {
        let mut b = machine_a();
        b.hostname = "line-4-hmi".to_string();
        assert_ne!(machine_a().fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_normalize_macs() {
        let macs = normalize_macs([
            "BB:00:00:00:00:01",
            "",
            "00:00:00:00:00:00",
            "aa:00:00:00:00:01",
            "bb:00:00:00:00:01\n",
        ]);
        assert_eq!(macs, vec!["aa:00:00:00:00:01", "bb:00:00:00:00:01"]);
    }

    #[test]
    fn test_mac_order_irrelevant() {
        assert_eq!(
            normalize_macs(["aa:aa:aa:aa:aa:02", "aa:aa:aa:aa:aa:01"]),
            normalize_macs(["aa:aa:aa:aa:aa:01", "aa:aa:aa:aa:aa:02"])
        );
    }

    #[test]
    fn test_platform_names() {
        assert_eq!(platform_name("macos"), "darwin");
        assert_eq!(platform_name("windows"), "win32");
        assert_eq!(platform_name("linux"), "linux");
        assert_eq!(arch_name("x86_64"), "x64");
        assert_eq!(arch_name("aarch64"), "arm64");
        assert_eq!(os_type_name("windows"), "Windows_NT");
        assert_eq!(os_type_name("macos"), "Darwin");
    }

    #[test]
    fn test_parse_cpuinfo() {
        let cpuinfo =
            "processor\t: 0\nvendor_id\t: GenuineIntel\nmodel name\t: Intel(R) Xeon(R) CPU\n";
        assert_eq!(parse_cpuinfo_model(cpuinfo).as_deref(), Some("Intel(R) Xeon(R) CPU"));
        assert_eq!(parse_cpuinfo_model("processor\t: 0\n"), None);
    }

    #[test]
    fn test_parse_meminfo() {
        let meminfo = "MemTotal:       16314488 kB\nMemFree:         1234 kB\n";
        assert_eq!(parse_meminfo_total(meminfo), Some(16_314_488 * 1024));
        assert_eq!(parse_meminfo_total("MemFree: 1 kB\n"), None);
    }

    #[test]
    fn test_current_machine_fingerprint_stable() {
        let first = hardware_fingerprint();
        assert_eq!(first.len(), 64);
        assert_eq!(first, hardware_fingerprint());
    }
}
