//! 配置校验模块
//!
//! 校验规则：
//! - receiver name 非空且唯一
//! - queue_capacity >= 1
//! - batch: batch_size >= 1, flush_interval_ms > 0, 仅 file receiver 可用
//! - 路由中引用的 receiver 必须存在
//! - 所有正则必须可编译

use std::collections::HashSet;

use contracts::{ContractError, ExporterConfig, ReceiverConfig, RouteConfig, RuleConfig, SinkType};
use routing::{Rule, RoutingError};

/// 校验 ExporterConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &ExporterConfig) -> Result<(), ContractError> {
    let names = validate_receivers(&config.receivers)?;
    validate_route(&config.route, "route", &names)?;
    Ok(())
}

/// 校验 receiver 列表，返回全部名称
fn validate_receivers(receivers: &[ReceiverConfig]) -> Result<HashSet<&str>, ContractError> {
    let mut seen = HashSet::new();
    for (idx, receiver) in receivers.iter().enumerate() {
        if receiver.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("receivers[{}].name", idx),
                "receiver name cannot be empty",
            ));
        }
        if !seen.insert(receiver.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("receivers[name={}]", receiver.name),
                "duplicate receiver name",
            ));
        }
        if receiver.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("receivers[{}].queue_capacity", receiver.name),
                "queue_capacity must be >= 1",
            ));
        }
        validate_batch(receiver)?;
    }
    Ok(seen)
}

/// 校验批量写入设置
fn validate_batch(receiver: &ReceiverConfig) -> Result<(), ContractError> {
    let Some(batch) = &receiver.batch else {
        return Ok(());
    };

    if receiver.sink_type != SinkType::File {
        return Err(ContractError::config_validation(
            format!("receivers[{}].batch", receiver.name),
            format!(
                "batching is only supported for file receivers, got {:?}",
                receiver.sink_type
            ),
        ));
    }
    if batch.batch_size == 0 {
        return Err(ContractError::config_validation(
            format!("receivers[{}].batch.batch_size", receiver.name),
            "batch_size must be >= 1",
        ));
    }
    if batch.flush_interval_ms == 0 {
        return Err(ContractError::config_validation(
            format!("receivers[{}].batch.flush_interval_ms", receiver.name),
            "flush_interval_ms must be > 0",
        ));
    }
    if batch.flush_timeout_ms == Some(0) {
        return Err(ContractError::config_validation(
            format!("receivers[{}].batch.flush_timeout_ms", receiver.name),
            "flush_timeout_ms must be > 0 when set",
        ));
    }
    Ok(())
}

/// 递归校验路由树
fn validate_route(
    route: &RouteConfig,
    path: &str,
    receivers: &HashSet<&str>,
) -> Result<(), ContractError> {
    for (idx, rule) in route.drop.iter().enumerate() {
        validate_rule(rule, &format!("{path}.drop[{idx}]"), receivers)?;
    }
    for (idx, rule) in route.matchers.iter().enumerate() {
        validate_rule(rule, &format!("{path}.match[{idx}]"), receivers)?;
    }
    for (idx, child) in route.routes.iter().enumerate() {
        validate_route(child, &format!("{path}.routes[{idx}]"), receivers)?;
    }
    Ok(())
}

fn validate_rule(
    rule: &RuleConfig,
    path: &str,
    receivers: &HashSet<&str>,
) -> Result<(), ContractError> {
    if let Err(RoutingError::InvalidPattern {
        field,
        pattern,
        source,
    }) = Rule::compile(rule)
    {
        return Err(ContractError::config_validation(
            format!("{path}.{field}"),
            format!("invalid pattern '{pattern}': {source}"),
        ));
    }

    if !rule.receiver.is_empty() && !receivers.contains(rule.receiver.as_str()) {
        return Err(ContractError::config_validation(
            format!("{path}.receiver"),
            format!("receiver '{}' is not defined", rule.receiver),
        ));
    }
    Ok(())
}
