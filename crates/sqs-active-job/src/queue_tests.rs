//! Tests for queue identifiers.

use super::*;

#[test]
fn test_fifo_detection() {
    assert!(!is_fifo("https://example/q"));
    assert!(is_fifo("https://example/q.fifo"));
    assert!(!is_fifo("https://example/q.fifo2"));
}

#[test]
fn test_fifo_detection_is_exact() {
    // No case folding and no trimming of trailing characters
    assert!(!is_fifo("https://example/q.FIFO"));
    assert!(!is_fifo("https://example/q.fifo/"));
    assert!(!is_fifo("https://example/q.fifo?Action=SendMessage"));
    assert!(is_fifo(".fifo"));
}

#[test]
fn test_queue_url_reports_fifo() {
    let url = QueueUrl::new("https://sqs.us-east-1.amazonaws.com/123/orders.fifo").unwrap();
    assert!(url.is_fifo());

    let url = QueueUrl::new("https://sqs.us-east-1.amazonaws.com/123/orders").unwrap();
    assert!(!url.is_fifo());
}

#[test]
fn test_queue_url_rejects_blank_values() {
    assert!(QueueUrl::new("").is_err());
    assert!(QueueUrl::new("   ").is_err());
}

#[test]
fn test_job_queue_name_validation() {
    // Valid names
    assert!(JobQueueName::new("default").is_ok());
    assert!(JobQueueName::new("mailers").is_ok());
    assert!(JobQueueName::new("high-priority_v2").is_ok());

    // Invalid names
    assert!(JobQueueName::new("").is_err());
    assert!(JobQueueName::new(":").is_err());
    assert!(JobQueueName::new("two words").is_err());
    assert!(JobQueueName::new("tab\tname").is_err());
}

#[test]
fn test_job_queue_name_symbol_spelling_is_canonicalized() {
    let symbol = JobQueueName::new(":orders").unwrap();
    let plain = JobQueueName::new("orders").unwrap();

    assert_eq!(symbol, plain);
    assert_eq!(symbol.as_str(), "orders");
}

#[test]
fn test_job_queue_name_conversion_validates() {
    let name = JobQueueName::try_from(":reports".to_string()).unwrap();
    assert_eq!(name.as_str(), "reports");

    assert!(JobQueueName::try_from(String::new()).is_err());
    assert!("bad name".parse::<JobQueueName>().is_err());
}
