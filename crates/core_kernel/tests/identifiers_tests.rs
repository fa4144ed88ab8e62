//! Unit tests for the Identifiers module

use core_kernel::{CaseId, InvoiceId, PaymentId};
use uuid::Uuid;

mod invoice_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        assert_ne!(InvoiceId::new(), InvoiceId::new());
    }

    #[test]
    fn test_new_v7_generates_time_ordered_ids() {
        let id1 = InvoiceId::new_v7();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let id2 = InvoiceId::new_v7();
        assert!(id1 < id2);
    }

    #[test]
    fn test_parse_with_and_without_prefix() {
        let uuid = Uuid::new_v4();
        let with_prefix: InvoiceId = format!("INVC-{}", uuid).parse().unwrap();
        let bare: InvoiceId = uuid.to_string().parse().unwrap();
        assert_eq!(with_prefix, bare);
    }

    #[test]
    fn test_parse_invalid() {
        assert!("INVC-not-a-uuid".parse::<InvoiceId>().is_err());
    }
}

mod conversions {
    use super::*;

    #[test]
    fn test_uuid_roundtrip() {
        let uuid = Uuid::new_v4();
        let case_id = CaseId::from(uuid);
        let back: Uuid = case_id.into();
        assert_eq!(uuid, back);
    }

    #[test]
    fn test_prefixes() {
        assert_eq!(CaseId::prefix(), "CASE");
        assert_eq!(InvoiceId::prefix(), "INVC");
        assert_eq!(PaymentId::prefix(), "PAY");
    }

    #[test]
    fn test_serializes_as_bare_uuid() {
        let uuid = Uuid::new_v4();
        let id = PaymentId::from_uuid(uuid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));
    }
}
