use logweave::domain::models::MaskingConfig;
use logweave::infrastructure::logging::{mask_extra, mask_message, MaskRules};
use proptest::prelude::*;
use serde_json::{Map, Value};

fn default_rules() -> (MaskRules, MaskingConfig) {
    let config = MaskingConfig::default();
    let (rules, errors) = MaskRules::compile(&config.mask_regex);
    assert!(errors.is_empty());
    (rules, config)
}

/// Plain words, emails and card numbers, space separated
fn message() -> impl Strategy<Value = String> {
    let word = prop_oneof![
        4 => "[a-z]{1,8}",
        1 => "[a-z]{1,6}@[a-z]{1,6}\\.(com|org)",
        1 => "[0-9]{4}[ -][0-9]{4}[ -][0-9]{4}[ -][0-9]{4}",
    ];
    prop::collection::vec(word, 0..12).prop_map(|words| words.join(" "))
}

proptest! {
    /// Property: masking a masked message changes nothing
    #[test]
    fn prop_message_masking_is_idempotent(text in message()) {
        let (rules, config) = default_rules();
        let once = mask_message(&text, &rules, &config.default_mask);
        let twice = mask_message(&once, &rules, &config.default_mask);
        prop_assert_eq!(once, twice);
    }

    /// Property: no email address survives masking
    #[test]
    fn prop_no_email_survives(text in message()) {
        let (rules, config) = default_rules();
        let masked = mask_message(&text, &rules, &config.default_mask);
        prop_assert!(!masked.contains('@'), "unmasked email in {masked:?}");
    }

    /// Property: listed fields are masked whatever their value, others keep their shape
    #[test]
    fn prop_listed_fields_always_masked(
        secret in any::<i64>(),
        user in "[a-z]{1,10}",
    ) {
        let (rules, config) = default_rules();
        let mut fields = Map::new();
        fields.insert("secret".to_string(), Value::from(secret));
        fields.insert("user".to_string(), Value::from(user.clone()));

        let masked = mask_extra(fields, &config.mask_fields, &rules, &config.default_mask);

        prop_assert_eq!(&masked["secret"], &Value::from("XXXXXXXX"));
        prop_assert_eq!(&masked["user"], &Value::from(user));
    }

    /// Property: a listed key is masked at any nesting depth
    #[test]
    fn prop_nested_listed_key_masked(depth in 0usize..10, value in any::<u32>()) {
        let (rules, config) = default_rules();
        let mut leaf = Map::new();
        leaf.insert("token".to_string(), Value::from(value));
        let mut fields = leaf;
        for level in 0..depth {
            let mut outer = Map::new();
            outer.insert(format!("level{level}"), Value::Object(fields));
            fields = outer;
        }

        let masked = mask_extra(fields, &config.mask_fields, &rules, &config.default_mask);

        let mut current = &Value::Object(masked);
        for level in (0..depth).rev() {
            current = &current[format!("level{level}").as_str()];
        }
        prop_assert_eq!(&current["token"], &Value::from("XXXXXXXX"));
    }
}
