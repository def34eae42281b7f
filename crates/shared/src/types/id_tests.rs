use super::*;
use std::str::FromStr;
use uuid::Uuid;

#[test]
fn test_typed_id_is_time_ordered() {
    let first = WarehouseId::new();
    let second = WarehouseId::new();
    assert!(first < second);
}

#[test]
fn test_typed_id_uuid_conversions() {
    let uuid = Uuid::new_v4();
    let id = AccountId::from(uuid);
    assert_eq!(id.into_inner(), uuid);
    assert_eq!(Uuid::from(id), uuid);
    assert_eq!(LedgerId::from_uuid(uuid).to_string(), uuid.to_string());
}

#[test]
fn test_typed_id_from_str() {
    let uuid = Uuid::new_v4();
    let id = LedgerId::from_str(&uuid.to_string()).unwrap();
    assert_eq!(id.into_inner(), uuid);
    assert!(LedgerId::from_str("not-a-uuid").is_err());
}

#[test]
fn test_typed_id_deserializes_from_plain_string() {
    let uuid = Uuid::new_v4();
    let json = format!("\"{uuid}\"");
    let id: WarehouseId = serde_json::from_str(&json).unwrap();
    assert_eq!(id.into_inner(), uuid);
}
