//! AWS rules
use crate::graph::{ResolvedBody, ResourceInstance};
use crate::rule::{BlockMatcher, Check, CheckContext, Expected, Rule, Severity, Status};
use crate::syntax::ResourceMode;
use crate::value::Value;

pub const NO_DEFAULT_VPC: Rule = Rule {
    code: "aws-vpc-no-default-vpc",
    summary: "AWS best practice is to not use the default VPC for workflows",
    resolution: "Create a non-default VPC for resources to be created in",
    severity: Severity::High,
    applies_to: BlockMatcher::Resource(&["aws_default_vpc"]),
    check: Check::Forbidden {
        message: "default VPC is managed by terraform",
    },
};

pub const SPECIFY_PUBLIC_ACCESS_BLOCK: Rule = Rule {
    code: "aws-s3-specify-public-access-block",
    summary: "S3 buckets should each define an aws_s3_bucket_public_access_block",
    resolution: "Define an aws_s3_bucket_public_access_block for the bucket",
    severity: Severity::Low,
    applies_to: BlockMatcher::Resource(&["aws_s3_bucket"]),
    check: Check::Custom(bucket_has_public_access_block),
};

pub const ADD_DESCRIPTION_TO_SECURITY_GROUP: Rule = Rule {
    code: "aws-vpc-add-decription-to-security-group",
    summary: "Missing description for security group/security group rule",
    resolution: "Add descriptions for all security groups and rules",
    severity: Severity::Low,
    applies_to: BlockMatcher::Resource(&["aws_security_group", "aws_security_group_rule"]),
    check: Check::RequireAttribute {
        path: &["description"],
        message: "security group or rule has no description",
    },
};

pub const NO_PUBLIC_INGRESS: Rule = Rule {
    code: "aws-vpc-no-public-ingress-sgr",
    summary: "An ingress security group rule allows traffic from /0",
    resolution: "Set a more restrictive cidr range",
    severity: Severity::Critical,
    applies_to: BlockMatcher::Resource(&["aws_security_group", "aws_security_group_rule"]),
    check: Check::Custom(no_public_ingress),
};

pub const NO_PUBLIC_ACL: Rule = Rule {
    code: "aws-s3-no-public-access-with-acl",
    summary: "S3 Buckets not publicly accessible through ACL",
    resolution: "Don't use canned ACLs or switch to private acl",
    severity: Severity::High,
    applies_to: BlockMatcher::Resource(&["aws_s3_bucket"]),
    check: Check::AttributeNotIn {
        path: &["acl"],
        forbidden: &[
            Expected::Str("public-read"),
            Expected::Str("public-read-write"),
            Expected::Str("authenticated-read"),
            Expected::Str("website"),
        ],
        message: "bucket has a public ACL",
    },
};

pub const ENABLE_VERSIONING: Rule = Rule {
    code: "aws-s3-enable-versioning",
    summary: "S3 Data should be versioned",
    resolution: "Enable versioning to protect against accidental/malicious removal or modification",
    severity: Severity::Medium,
    applies_to: BlockMatcher::Resource(&["aws_s3_bucket"]),
    check: Check::AttributeEquals {
        path: &["versioning", "enabled"],
        expected: Expected::Bool(true),
        required: true,
        message: "bucket does not have versioning enabled",
    },
};

pub const RULES: &[Rule] = &[
    NO_DEFAULT_VPC,
    SPECIFY_PUBLIC_ACCESS_BLOCK,
    ADD_DESCRIPTION_TO_SECURITY_GROUP,
    NO_PUBLIC_INGRESS,
    NO_PUBLIC_ACL,
    ENABLE_VERSIONING,
];

const PUBLIC_CIDRS: &[&str] = &["0.0.0.0/0", "::/0"];

/// Passes if some public access block refers to the bucket, by reference or by bucket name
fn bucket_has_public_access_block(ctx: &CheckContext<'_>) -> anyhow::Result<Status> {
    let bucket = ctx.instance;
    let bucket_name = bucket.body.get("bucket");

    let found = ctx
        .graph
        .instances_of_type("aws_s3_bucket_public_access_block")
        .filter(|block| block.key.mode == ResourceMode::Managed)
        .filter_map(|block| block.attribute("bucket"))
        .any(|attribute| {
            attribute.refers_to(bucket)
                || matches!(
                    (attribute.value.as_str(), bucket_name.as_str()),
                    (Some(block_bucket), Some(name)) if block_bucket == name
                )
        });

    Ok(if found {
        Status::Passed
    } else {
        Status::Failed("bucket does not have a corresponding public access block".to_string())
    })
}

/// Ingress rules (and inline ingress blocks of security groups) must not allow public cidrs
fn no_public_ingress(ctx: &CheckContext<'_>) -> anyhow::Result<Status> {
    let instance = ctx.instance;

    if instance.key.resource_type == "aws_security_group" {
        let mut statuses = vec![];
        for ingress in instance.body.blocks_named("ingress") {
            statuses.push(public_cidr_status(instance, &ingress.body)?);
        }
        return Ok(combine(statuses));
    }

    match instance.body.get("type").as_str() {
        Some("ingress") => public_cidr_status(instance, &instance.body),
        _ => Ok(Status::NotApplicable),
    }
}

fn public_cidr_status(instance: &ResourceInstance, body: &ResolvedBody) -> anyhow::Result<Status> {
    let mut unknown = false;

    for attribute in ["cidr_blocks", "ipv6_cidr_blocks"] {
        let cidrs = match body.get(attribute) {
            Value::Array(cidrs) => cidrs,
            Value::Unknown if body.attribute(attribute).is_none() => continue,
            Value::Unknown => {
                unknown = true;
                continue;
            }
            other => anyhow::bail!(
                "{}: `{attribute}` must be a list of cidr blocks, found {}",
                instance.address(),
                other.type_name()
            ),
        };

        for cidr in &cidrs {
            match cidr.as_str() {
                Some(cidr) if PUBLIC_CIDRS.contains(&cidr) => {
                    return Ok(Status::Failed(format!(
                        "ingress from public internet allowed by `{attribute}` ({cidr})"
                    )))
                }
                Some(_) => {}
                None => unknown = true,
            }
        }
    }

    Ok(if unknown {
        Status::NotApplicable
    } else {
        Status::Passed
    })
}

/// First failure, otherwise passed if anything passed
fn combine(statuses: Vec<Status>) -> Status {
    let mut combined = Status::NotApplicable;
    for status in statuses {
        match status {
            Status::Failed(_) => return status,
            Status::Passed => combined = Status::Passed,
            Status::NotApplicable => {}
        }
    }
    combined
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::graph::{Reference, ResolvedAttribute, ResourceGraph};
    use crate::syntax::ResourceKey;
    use pretty_assertions::assert_eq;

    fn attribute(value: Value, references: Vec<Reference>) -> ResolvedAttribute {
        ResolvedAttribute { value, references }
    }

    fn reference(instance: &ResourceInstance) -> Reference {
        Reference {
            key: instance.key.clone(),
            index: instance.index,
        }
    }

    fn instance(
        resource_type: &str,
        name: &str,
        attributes: Vec<(&str, ResolvedAttribute)>,
    ) -> ResourceInstance {
        let mut body = ResolvedBody::default();
        for (attribute_name, attribute) in attributes {
            body.attributes.insert(attribute_name.to_string(), attribute);
        }
        ResourceInstance {
            key: ResourceKey::managed(resource_type, name),
            index: None,
            body,
            source: None,
        }
    }

    fn check(rule: &Rule, instance: &ResourceInstance, graph: &ResourceGraph) -> Status {
        rule.check
            .evaluate(&CheckContext { instance, graph })
            .expect("check must not error")
    }

    #[test]
    fn public_access_block_by_reference() {
        let bucket = instance("aws_s3_bucket", "logs", vec![]);
        let block = instance(
            "aws_s3_bucket_public_access_block",
            "logs",
            vec![("bucket", attribute(Value::Unknown, vec![reference(&bucket)]))],
        );

        let mut graph = ResourceGraph::default();
        assert!(matches!(
            check(&SPECIFY_PUBLIC_ACCESS_BLOCK, &bucket, &graph),
            Status::Failed(_)
        ));

        graph.insert(block.key.clone(), vec![block]);
        assert_eq!(
            check(&SPECIFY_PUBLIC_ACCESS_BLOCK, &bucket, &graph),
            Status::Passed
        );
    }

    #[test]
    fn public_access_block_for_other_instance() {
        let bucket = |index| ResourceInstance {
            index: Some(index),
            ..instance("aws_s3_bucket", "logs", vec![])
        };
        let block = instance(
            "aws_s3_bucket_public_access_block",
            "logs",
            vec![("bucket", attribute(Value::Unknown, vec![reference(&bucket(0))]))],
        );

        let mut graph = ResourceGraph::default();
        graph.insert(block.key.clone(), vec![block]);
        assert_eq!(
            check(&SPECIFY_PUBLIC_ACCESS_BLOCK, &bucket(0), &graph),
            Status::Passed
        );
        assert!(matches!(
            check(&SPECIFY_PUBLIC_ACCESS_BLOCK, &bucket(1), &graph),
            Status::Failed(_)
        ));
    }

    #[test]
    fn public_access_block_by_name() {
        let bucket = instance(
            "aws_s3_bucket",
            "logs",
            vec![("bucket", attribute("logs-bucket".into(), vec![]))],
        );
        let block = instance(
            "aws_s3_bucket_public_access_block",
            "logs",
            vec![("bucket", attribute("logs-bucket".into(), vec![]))],
        );

        let mut graph = ResourceGraph::default();
        graph.insert(block.key.clone(), vec![block]);
        assert_eq!(
            check(&SPECIFY_PUBLIC_ACCESS_BLOCK, &bucket, &graph),
            Status::Passed
        );
    }

    #[test]
    fn public_ingress_rule() {
        let graph = ResourceGraph::default();
        let rule = |type_: &str, cidrs: Value| {
            instance(
                "aws_security_group_rule",
                "rule",
                vec![
                    ("type", attribute(type_.into(), vec![])),
                    ("cidr_blocks", attribute(cidrs, vec![])),
                ],
            )
        };

        assert!(matches!(
            check(
                &NO_PUBLIC_INGRESS,
                &rule("ingress", vec!["0.0.0.0/0"].into()),
                &graph
            ),
            Status::Failed(_)
        ));
        assert_eq!(
            check(
                &NO_PUBLIC_INGRESS,
                &rule("ingress", vec!["10.0.0.0/8"].into()),
                &graph
            ),
            Status::Passed
        );
        assert_eq!(
            check(
                &NO_PUBLIC_INGRESS,
                &rule("egress", vec!["0.0.0.0/0"].into()),
                &graph
            ),
            Status::NotApplicable
        );
        assert_eq!(
            check(&NO_PUBLIC_INGRESS, &rule("ingress", Value::Unknown), &graph),
            Status::NotApplicable
        );
    }

    #[test]
    fn malformed_cidr_blocks_is_an_error() {
        let graph = ResourceGraph::default();
        let instance = instance(
            "aws_security_group_rule",
            "rule",
            vec![
                ("type", attribute("ingress".into(), vec![])),
                ("cidr_blocks", attribute(Value::Boolean(true), vec![])),
            ],
        );

        let err = NO_PUBLIC_INGRESS
            .check
            .evaluate(&CheckContext {
                instance: &instance,
                graph: &graph,
            })
            .expect_err("must error");
        assert_eq!(
            err.to_string(),
            "aws_security_group_rule.rule: `cidr_blocks` must be a list of cidr blocks, found bool"
        );
    }

    #[test]
    fn combine_statuses() {
        assert_eq!(combine(vec![]), Status::NotApplicable);
        assert_eq!(
            combine(vec![Status::NotApplicable, Status::Passed]),
            Status::Passed
        );
        assert_eq!(
            combine(vec![Status::Passed, Status::Failed("x".into())]),
            Status::Failed("x".into())
        );
    }
}
