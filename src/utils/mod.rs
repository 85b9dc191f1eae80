//! 工具函数模块

use std::collections::HashMap;
use std::time::Duration;

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;
const MAX_NANOS: u128 = i64::MAX as u128;

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60 * NANOS_PER_SEC),
        "h" => Some(3600 * NANOS_PER_SEC),
        _ => None,
    }
}

/// 解析 Go 风格的时长字符串（`300ms`、`1.5h`、`2h45m`）
///
/// 语法错误或溢出返回 `None`；负数时长按零处理（对心跳而言等价于关闭）。
pub fn parse_duration(input: &str) -> Option<Duration> {
    let mut s = input;
    let mut negative = false;
    if let Some(rest) = s.strip_prefix('-') {
        negative = true;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }

    if s == "0" {
        return Some(Duration::ZERO);
    }
    if s.is_empty() {
        return None;
    }

    let mut total: u128 = 0;
    while !s.is_empty() {
        let int_len = s.bytes().take_while(u8::is_ascii_digit).count();
        let (int_part, rest) = s.split_at(int_len);
        s = rest;

        let mut frac_part = "";
        if let Some(rest) = s.strip_prefix('.') {
            let frac_len = rest.bytes().take_while(u8::is_ascii_digit).count();
            let (frac, rest) = rest.split_at(frac_len);
            frac_part = frac;
            s = rest;
        }
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }

        let unit_len = s
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() || *c == '.')
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        let (unit, rest) = s.split_at(unit_len);
        s = rest;
        let scale = unit_nanos(unit)?;

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().ok()?
        };
        let mut value = whole.checked_mul(scale)?;

        // 小数位最多取 18 位，超出部分不影响纳秒精度
        let frac_digits = &frac_part[..frac_part.len().min(18)];
        if !frac_digits.is_empty() {
            let frac: u128 = frac_digits.parse().ok()?;
            let denom = 10u128.pow(frac_digits.len() as u32);
            value = value.checked_add(frac * scale / denom)?;
        }

        total = total.checked_add(value)?;
        if total > MAX_NANOS {
            return None;
        }
    }

    if negative {
        return Some(Duration::ZERO);
    }
    let secs = (total / NANOS_PER_SEC) as u64;
    let nanos = (total % NANOS_PER_SEC) as u32;
    Some(Duration::new(secs, nanos))
}

/// 解析 `key=value` 形式的元数据
///
/// 以第一个 `=` 切分，其余部分原样作为值；没有 `=` 的条目得到空值。
pub fn parse_metadata<S: AsRef<str>>(entries: &[S]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|entry| match entry.as_ref().split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (entry.as_ref().to_string(), String::new()),
        })
        .collect()
}

/// 拆分逗号分隔的列表（环境变量中的地址、元数据）
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
