use super::*;

#[test]
fn producer_config_requires_full_acknowledgement() {
    let config = KafkaConfig::new("localhost:9092").producer_config();

    assert_eq!(config.get("acks"), Some("all"));
    assert_eq!(config.get("enable.idempotence"), Some("true"));
    assert_eq!(config.get("max.in.flight.requests.per.connection"), Some("1"));
    assert_eq!(config.get("retries"), Some("5"));
}

#[test]
fn consumer_config_disables_auto_commit() {
    let config = KafkaConfig::new("localhost:9092")
        .with_group_id("trip-service-group")
        .consumer_config();

    assert_eq!(config.get("enable.auto.commit"), Some("false"));
    assert_eq!(config.get("auto.offset.reset"), Some("earliest"));
    assert_eq!(config.get("group.id"), Some("trip-service-group"));
}

#[test]
fn broker_list_is_passed_through() {
    let config = KafkaConfig::new("kafka-1:9092,kafka-2:9092");
    assert_eq!(
        config.producer_config().get("bootstrap.servers"),
        Some("kafka-1:9092,kafka-2:9092")
    );
    assert_eq!(
        config.consumer_config().get("bootstrap.servers"),
        Some("kafka-1:9092,kafka-2:9092")
    );
}
