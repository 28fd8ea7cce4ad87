use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use condb::construct::{Condition, ConditionType};
use condb::datatype::{Value, ValueType};
use condb::error::CondbError;

fn stamp() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2018, 11, 30)
        .unwrap()
        .and_hms_opt(14, 30, 22)
        .unwrap()
}

fn condition_of(value_type: ValueType, value: Value) -> Condition {
    let condition_type = Arc::new(ConditionType::new(1, "probe".to_string(), value_type));
    Condition::new(condition_type, 10, 1000, value).expect("kinds agree")
}

#[test]
fn bool_condition_only_converts_to_boolean() {
    let condition = condition_of(ValueType::Bool, Value::Bool(true));
    assert!(condition.to_boolean().unwrap());
    assert!(matches!(
        condition.to_long(),
        Err(CondbError::TypeMismatch { actual: ValueType::Bool, .. })
    ));
    assert!(matches!(condition.to_double(), Err(CondbError::TypeMismatch { .. })));
    assert!(matches!(condition.to_text(), Err(CondbError::TypeMismatch { .. })));
    assert!(matches!(condition.to_time(), Err(CondbError::TypeMismatch { .. })));
    assert!(matches!(condition.to_json(), Err(CondbError::TypeMismatch { .. })));
}

#[test]
fn long_widens_to_boolean_and_double() {
    let condition = condition_of(ValueType::Long, Value::Long(7));
    assert_eq!(condition.to_long().unwrap(), 7);
    assert_eq!(condition.to_int().unwrap(), 7);
    assert!(condition.to_boolean().unwrap());
    assert_eq!(condition.to_double().unwrap(), 7.0);

    let zero = condition_of(ValueType::Long, Value::Long(0));
    assert!(!zero.to_boolean().unwrap());
}

#[test]
fn long_does_not_convert_to_text_or_time() {
    let condition = condition_of(ValueType::Long, Value::Long(7));
    assert!(matches!(condition.to_text(), Err(CondbError::TypeMismatch { .. })));
    assert!(matches!(condition.to_time(), Err(CondbError::TypeMismatch { .. })));
}

#[test]
fn double_condition_does_not_narrow() {
    let condition = condition_of(ValueType::Double, Value::Double(2.5));
    assert_eq!(condition.to_double().unwrap(), 2.5);
    assert!(matches!(condition.to_long(), Err(CondbError::TypeMismatch { .. })));
    assert!(matches!(condition.to_boolean(), Err(CondbError::TypeMismatch { .. })));
}

#[test]
fn text_kinds_share_the_text_accessor() {
    let json = condition_of(ValueType::Json, Value::Json("{\"a\": 1}".to_string()));
    let string = condition_of(ValueType::String, Value::String("beam on".to_string()));
    let blob = condition_of(ValueType::Blob, Value::Blob("x|y|z".to_string()));
    assert_eq!(json.to_text().unwrap(), "{\"a\": 1}");
    assert_eq!(string.to_text().unwrap(), "beam on");
    assert_eq!(blob.to_text().unwrap(), "x|y|z");
    // only the json kind parses into a document
    assert!(matches!(string.to_json(), Err(CondbError::TypeMismatch { .. })));
}

#[test]
fn time_condition_yields_its_stamp() {
    let condition = condition_of(ValueType::Time, Value::Time(stamp()));
    assert_eq!(condition.to_time().unwrap(), stamp());
    assert!(matches!(condition.to_text(), Err(CondbError::TypeMismatch { .. })));
}

#[test]
fn json_parses_on_demand() {
    let good = condition_of(ValueType::Json, Value::Json("{\"mode\": 3}".to_string()));
    assert!(good.to_json().is_ok());

    let bad = condition_of(ValueType::Json, Value::Json("{nope".to_string()));
    assert!(matches!(bad.to_json(), Err(CondbError::MalformedJson(_))));
}

#[test]
fn int_narrowing_checks_the_range() {
    let small = condition_of(ValueType::Long, Value::Long(41));
    assert_eq!(small.to_int().unwrap(), 41);

    let huge = condition_of(ValueType::Long, Value::Long(i64::MAX));
    assert!(matches!(
        huge.to_int(),
        Err(CondbError::ValueOutOfRange { target: "i32", .. })
    ));
}

#[test]
fn value_kind_must_agree_with_the_type_tag() {
    let condition_type = Arc::new(ConditionType::new(1, "events".to_string(), ValueType::Long));
    let err = Condition::new(condition_type, 10, 1000, Value::Bool(true)).unwrap_err();
    assert!(matches!(
        err,
        CondbError::TypeMismatch { expected: "long", actual: ValueType::Bool }
    ));
}

#[test]
fn from_slots_picks_the_slot_named_by_the_tag() {
    let cases = [
        (ValueType::Bool, Value::Bool(true)),
        (ValueType::Json, Value::Json("text".to_string())),
        (ValueType::String, Value::String("text".to_string())),
        (ValueType::Double, Value::Double(2.5)),
        (ValueType::Long, Value::Long(5)),
        (ValueType::Time, Value::Time(stamp())),
        (ValueType::Blob, Value::Blob("text".to_string())),
    ];
    for (value_type, expected) in cases {
        let condition_type = Arc::new(ConditionType::new(1, "probe".to_string(), value_type));
        // every slot is populated; only the tagged one may come through
        let condition = Condition::from_slots(
            condition_type,
            10,
            1000,
            5,
            true,
            2.5,
            "text".to_string(),
            stamp(),
        );
        assert_eq!(*condition.value(), expected);
        assert_eq!(condition.value_type(), value_type);
    }
}

#[test]
fn condition_exposes_its_identity() {
    let condition = condition_of(ValueType::Long, Value::Long(9));
    assert_eq!(condition.id(), 10);
    assert_eq!(condition.run_number(), 1000);
    assert_eq!(condition.name(), "probe");
}
