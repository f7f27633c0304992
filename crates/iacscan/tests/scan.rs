//! End to end scans of in-memory configurations

use iacscan::hcl_documents;
use iacscan::module::Module;
use iacscan::registry;
use iacscan::report::{ResultStatus, ScanReport, Warning};
use iacscan::scanner::Scanner;
use iacscan::variables::Overrides;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("IACSCAN_LOG"))
        .with_test_writer()
        .try_init();
}

fn scan(src: &str) -> ScanReport {
    scan_with(src, Overrides::default())
}

fn scan_with(src: &str, overrides: Overrides) -> ScanReport {
    init_tracing();
    let module = Module::new(&hcl_documents!(src)).expect("valid module");
    Scanner::new(registry::global()).scan(&module, overrides)
}

/// (name, source, code that must fail, code that must not fail)
const COUNT_CASES: &[(&str, &str, Option<&str>, Option<&str>)] = &[
    (
        "unspecified count defaults to 1",
        r#"
        resource "aws_default_vpc" "this" {}
        "#,
        Some("aws-vpc-no-default-vpc"),
        None,
    ),
    (
        "count is literal 1",
        r#"
        resource "aws_default_vpc" "this" {
          count = 1
        }
        "#,
        Some("aws-vpc-no-default-vpc"),
        None,
    ),
    (
        "count is literal 99",
        r#"
        resource "aws_default_vpc" "this" {
          count = 99
        }
        "#,
        Some("aws-vpc-no-default-vpc"),
        None,
    ),
    (
        "count is literal 0",
        r#"
        resource "aws_default_vpc" "this" {
          count = 0
        }
        "#,
        None,
        Some("aws-vpc-no-default-vpc"),
    ),
    (
        "count is 0 from variable",
        r#"
        variable "count" {
          default = 0
        }
        resource "aws_default_vpc" "this" {
          count = var.count
        }
        "#,
        None,
        Some("aws-vpc-no-default-vpc"),
    ),
    (
        "count is 1 from variable",
        r#"
        variable "count" {
          default = 1
        }
        resource "aws_default_vpc" "this" {
          count = var.count
        }
        "#,
        Some("aws-vpc-no-default-vpc"),
        None,
    ),
    (
        "count is 1 from variable without default",
        r#"
        variable "count" {
        }
        resource "aws_default_vpc" "this" {
          count = var.count
        }
        "#,
        Some("aws-vpc-no-default-vpc"),
        None,
    ),
    (
        "count is 0 from conditional",
        r#"
        variable "enabled" {
          default = false
        }
        resource "aws_default_vpc" "this" {
          count = var.enabled ? 1 : 0
        }
        "#,
        None,
        Some("aws-vpc-no-default-vpc"),
    ),
    (
        "count is 1 from conditional on a string",
        r#"
        variable "enabled" {
          default = "true"
        }
        resource "aws_default_vpc" "this" {
          count = var.enabled ? 1 : 0
        }
        "#,
        Some("aws-vpc-no-default-vpc"),
        None,
    ),
    (
        "public access block gated like its bucket",
        r#"
        resource "aws_s3_bucket" "access-logs-bucket" {
          count         = var.enable_cloudtrail ? 1 : 0
          bucket        = "cloudtrail-access-logs"
          acl           = "private"
          force_destroy = true

          versioning {
            enabled = true
          }

          server_side_encryption_configuration {
            rule {
              apply_server_side_encryption_by_default {
                sse_algorithm = "AES256"
              }
            }
          }
        }

        resource "aws_s3_bucket_public_access_block" "access-logs" {
          count = var.enable_cloudtrail ? 1 : 0

          bucket = aws_s3_bucket.access-logs-bucket[0].id

          block_public_acls       = true
          block_public_policy     = true
          ignore_public_acls      = true
          restrict_public_buckets = true
        }
        "#,
        None,
        Some("aws-s3-specify-public-access-block"),
    ),
    (
        "count.index selects the variable element",
        r#"
        resource "aws_security_group_rule" "trust-rules-dev" {
          count             = 1
          description       = var.trust-sg-rules[count.index]["description"]
          type              = "ingress"
          protocol          = "tcp"
          cidr_blocks       = ["0.0.0.0/2"]
          to_port           = var.trust-sg-rules[count.index]["to_port"]
          from_port         = 10
          security_group_id = aws_security_group.trust-rules-dev.id
        }

        resource "aws_security_group" "trust-rules-dev" {
          description = "description"
        }

        variable "trust-sg-rules" {
          description = "A list of maps that creates a number of sg"
          type        = list(map(string))

          default = [
            {
              description = "Allow egress of http traffic"
              from_port   = "80"
              to_port     = "80"
              type        = "egress"
            }
          ]
        }
        "#,
        None,
        Some("aws-vpc-add-decription-to-security-group"),
    ),
];

#[test]
fn resources_with_count() {
    for (name, src, must_fail, must_not_fail) in COUNT_CASES {
        let report = scan(src);

        if let Some(code) = must_fail {
            assert!(report.has_failure(code), "{name}: expected {code} to fail");
        }
        if let Some(code) = must_not_fail {
            assert!(!report.has_failure(code), "{name}: expected {code} not to fail");
        }
    }
}

#[test]
fn count_produces_one_result_per_instance() {
    let report = scan(
        r#"
        resource "aws_default_vpc" "this" {
          count = 3
        }
        "#,
    );

    let addresses: Vec<String> = report.failures().map(|result| result.address()).collect();
    insta::assert_snapshot!(addresses.join("\n"), @r###"
    aws_default_vpc.this[0]
    aws_default_vpc.this[1]
    aws_default_vpc.this[2]
    "###);
}

#[test]
fn count_index_resolves_per_instance() {
    let report = scan(
        r#"
        variable "rules" {
          default = [
            { description = "http" },
            { description = "" },
          ]
        }

        resource "aws_security_group_rule" "rule" {
          count       = 2
          type        = "egress"
          description = var.rules[count.index].description
        }
        "#,
    );

    let lines: Vec<String> = report
        .results
        .iter()
        .map(|result| format!("{} {} {}", result.status, result.rule_code, result.address()))
        .collect();
    insta::assert_snapshot!(lines.join("\n"), @r###"
    PASSED aws-vpc-add-decription-to-security-group aws_security_group_rule.rule[0]
    FAILED aws-vpc-add-decription-to-security-group aws_security_group_rule.rule[1]
    "###);
}

#[test]
fn overrides_take_precedence() {
    let src = r#"
        variable "enabled" {
          default = true
        }
        resource "aws_default_vpc" "this" {
          count = var.enabled ? 1 : 0
        }
    "#;

    assert!(scan(src).has_failure("aws-vpc-no-default-vpc"));

    let mut overrides = Overrides::from_env_vars([("TF_VAR_enabled".into(), "false".into())]);
    assert!(!scan_with(src, overrides.clone()).has_failure("aws-vpc-no-default-vpc"));

    overrides.merge(Overrides::parse_tfvars("enabled = true").expect("valid tfvars"));
    assert!(scan_with(src, overrides).has_failure("aws-vpc-no-default-vpc"));
}

#[test]
fn unknown_values_do_not_fail() {
    let report = scan(
        r#"
        variable "acl" {}

        resource "aws_s3_bucket" "logs" {
          bucket = "logs"
          acl    = var.acl

          versioning {
            enabled = var.versioning
          }
        }

        resource "aws_s3_bucket_public_access_block" "logs" {
          bucket = aws_s3_bucket.logs.id
        }
        "#,
    );

    assert!(!report.has_failures(), "{:#?}", report.results);
    assert_eq!(
        report.codes_with_status(ResultStatus::Passed),
        vec!["aws-s3-specify-public-access-block"]
    );
}

#[test]
fn known_values_fail() {
    let report = scan(
        r#"
        resource "aws_s3_bucket" "logs" {
          bucket = "logs"
          acl    = "public-read"
        }
        "#,
    );

    insta::assert_snapshot!(report.codes_with_status(ResultStatus::Failed).join("\n"), @r###"
    aws-s3-specify-public-access-block
    aws-s3-no-public-access-with-acl
    aws-s3-enable-versioning
    "###);
}

#[test]
fn data_sources_are_separate_from_resources() {
    let report = scan(
        r#"
        data "aws_s3_bucket" "logs" {
          bucket = "logs"
        }

        resource "aws_s3_bucket" "logs" {
          bucket = data.aws_s3_bucket.logs.bucket
          versioning {
            enabled = true
          }
        }

        resource "aws_s3_bucket_public_access_block" "logs" {
          bucket = "logs"
        }
        "#,
    );

    assert!(!report.has_failures(), "{:#?}", report.results);
    assert!(report
        .results
        .iter()
        .all(|result| result.block_name == "logs" && result.block_type == "aws_s3_bucket"));
}

#[test]
fn locals_are_resolved() {
    let report = scan(
        r#"
        locals {
          create = local.environment == "prod"
          environment = "dev"
        }

        resource "aws_default_vpc" "this" {
          count = local.create ? 1 : 0
        }
        "#,
    );

    assert!(report.results.is_empty());
}

#[test]
fn configuration_warnings_are_reported() {
    let report = scan(
        r#"
        resource "aws_default_vpc" "negative" {
          count = -1
        }

        resource "aws_default_vpc" "boolean" {
          count = true
        }

        resource "aws_default_vpc" "uncounted" {
          tags = { index = count.index }
        }
        "#,
    );

    assert_eq!(
        report.warnings,
        vec![
            Warning::NegativeCount {
                resource: "aws_default_vpc.negative".into(),
                count: -1.0
            },
            Warning::InvalidCount {
                resource: "aws_default_vpc.boolean".into(),
                found: "bool"
            },
            Warning::CountIndexWithoutCount {
                resource: "aws_default_vpc.uncounted".into(),
                attribute: "tags".into()
            },
        ]
    );

    let addresses: Vec<String> = report.failures().map(|result| result.address()).collect();
    assert_eq!(
        addresses,
        vec!["aws_default_vpc.boolean[0]", "aws_default_vpc.uncounted"]
    );
}

#[test]
fn scans_are_deterministic() {
    let src = r#"
        resource "aws_s3_bucket" "a" {
          count = 5
          acl   = "public-read"
        }
        resource "aws_security_group" "b" {
          count = 5
          ingress {
            cidr_blocks = ["0.0.0.0/0"]
          }
        }
        resource "aws_default_vpc" "c" {
          count = 5
        }
    "#;
    init_tracing();
    let module = Module::new(&hcl_documents!(src)).expect("valid module");

    let sequential = Scanner::new(registry::global())
        .parallel(false)
        .scan(&module, Overrides::default());
    assert_eq!(sequential.results.len(), 5 * 3 + 5 * 2 + 5);

    for _ in 0..5 {
        let parallel = Scanner::new(registry::global()).scan(&module, Overrides::default());
        assert_eq!(parallel, sequential);
    }
}

#[test]
fn overflowing_counts_are_assumed_present() {
    let report = scan(
        r#"
        variable "x" {
          default = "-9223372036854775808"
        }

        resource "aws_default_vpc" "divided" {
          count = var.x / -1
        }

        resource "aws_default_vpc" "huge" {
          count = 1e30
        }
        "#,
    );

    assert_eq!(
        report.warnings,
        vec![
            Warning::CountTooLarge {
                resource: "aws_default_vpc.divided".into(),
                count: -(i64::MIN as f64)
            },
            Warning::CountTooLarge {
                resource: "aws_default_vpc.huge".into(),
                count: 1e30
            },
        ]
    );

    let addresses: Vec<String> = report.failures().map(|result| result.address()).collect();
    assert_eq!(
        addresses,
        vec!["aws_default_vpc.divided[0]", "aws_default_vpc.huge[0]"]
    );
}

#[test]
fn public_access_block_covers_referenced_instance_only() {
    let report = scan(
        r#"
        resource "aws_s3_bucket" "logs" {
          count  = 2
          bucket = "logs-${count.index}"
          versioning {
            enabled = true
          }
        }

        resource "aws_s3_bucket_public_access_block" "logs" {
          count  = 1
          bucket = aws_s3_bucket.logs[0].id
        }
        "#,
    );

    let lines: Vec<String> = report
        .results
        .iter()
        .filter(|result| result.rule_code == "aws-s3-specify-public-access-block")
        .map(|result| format!("{} {}", result.status, result.address()))
        .collect();
    insta::assert_snapshot!(lines.join("\n"), @r###"
    PASSED aws_s3_bucket.logs[0]
    FAILED aws_s3_bucket.logs[1]
    "###);
}
