//! # Configuration Tests
//!
//! Tests for hart configuration defaults, JSON deserialization and validation.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use rvpriv_core::Hart;
use rvpriv_core::config::{ConfigError, ExtensionConfig, HartConfig, Xlen};
use rvpriv_core::core::units::mmu::tlb::Tlb;
use rvpriv_core::soc::Ram;

#[test]
fn test_config_default() {
    let config = HartConfig::default();
    assert_eq!(config.hart_id, 0);
    assert_eq!(config.xlen, Xlen::Rv64);
    assert_eq!(config.pmp_entries, 16);
    assert_eq!(config.tlb_size, 32);
    assert_eq!(config.reset_vector, 0x8000_0000);
    assert_eq!(config.max_walk_restarts, 64);
    assert!(config.validate().is_ok());
}

#[test]
fn test_extension_defaults() {
    let ext = ExtensionConfig::default();
    assert!(!ext.hypervisor);
    assert!(ext.mmu);
    assert!(ext.pmp);
}

#[test]
fn test_empty_json_matches_default() {
    let config = HartConfig::from_json("{}").unwrap();
    assert_eq!(config, HartConfig::default());
}

#[test]
fn test_partial_extensions_keep_defaults() {
    let config = HartConfig::from_json(r#"{ "extensions": { "pmp": false } }"#).unwrap();
    assert!(!config.extensions.pmp);
    assert!(config.extensions.mmu);
    assert!(!config.extensions.hypervisor);
}

#[test]
fn test_xlen_aliases() {
    for name in ["Rv32", "rv32", "RV32"] {
        let json = format!(r#"{{ "xlen": "{name}" }}"#);
        assert_eq!(HartConfig::from_json(&json).unwrap().xlen, Xlen::Rv32);
    }
}

#[test]
fn test_xlen_bits() {
    assert_eq!(Xlen::Rv32.bits(), 32);
    assert_eq!(Xlen::Rv64.cause_interrupt_bit(), 1 << 63);
    assert_eq!(Xlen::Rv32.cause_interrupt_bit(), 1 << 31);
}

#[test]
fn test_malformed_json_is_json_error() {
    let err = HartConfig::from_json("{ hart_id: 1 ").unwrap_err();
    assert!(matches!(err, ConfigError::Json(_)));
}

#[test]
fn test_too_many_pmp_entries_rejected() {
    let err = HartConfig::from_json(r#"{ "pmp_entries": 65 }"#).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(err.to_string().contains("pmp_entries"));
}

#[test]
fn test_zero_tlb_rejected() {
    let config = HartConfig {
        tlb_size: 0,
        ..HartConfig::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_zero_walk_restarts_rejected() {
    let config = HartConfig {
        max_walk_restarts: 0,
        ..HartConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_hart_new_validates() {
    let config = HartConfig {
        pmp_entries: 100,
        ..HartConfig::default()
    };
    let result = Hart::new(
        config,
        Arc::new(Ram::new(0x8000_0000, 0x1000)),
        Box::new(Tlb::new(8)),
    );
    assert!(result.is_err());
}

#[test]
fn test_hart_new_uses_config() {
    let config = HartConfig::from_json(r#"{ "hart_id": 3, "reset_vector": 4096 }"#).unwrap();
    let hart = Hart::new(
        config,
        Arc::new(Ram::new(0x8000_0000, 0x1000)),
        Box::new(Tlb::new(8)),
    )
    .unwrap();
    assert_eq!(hart.pc, 0x1000);
    assert_eq!(hart.config().hart_id, 3);
    assert_eq!(hart.pmp().entries().len(), 16);
}
