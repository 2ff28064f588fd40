//! Script text → [`Operation`] stream
//!
//! One instruction per line:
//!
//! ```text
//! begin(T1)
//! beginRO(T2)
//! R(T1,x4)
//! W(T1,x4,101)
//! end(T1)
//! fail(3)
//! recover(3)
//! dump()
//! ```
//!
//! Lines whose first character is not an ASCII letter are skipped, which
//! covers blank lines and `//` comments. Anything after the closing
//! parenthesis is ignored. Timestamps count instruction lines from 1.

use crate::error::{Error, Result};
use crate::operation::{Operation, OperationKind};
use crate::types::{SiteId, Timestamp, TxnId, Value, VarId};

/// Parse a whole script
pub fn parse_script(input: &str) -> Result<Vec<Operation>> {
    let mut operations = Vec::new();
    let mut timestamp: Timestamp = 0;

    for (idx, raw) in input.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim_end();
        if !line.starts_with(|c: char| c.is_ascii_alphabetic()) {
            continue;
        }
        timestamp += 1;
        let kind = parse_instruction(line).map_err(|message| Error::parse(line_no, message))?;
        operations.push(Operation::new(kind, timestamp));
    }

    Ok(operations)
}

/// Parse a single instruction line (without timestamp)
pub fn parse_instruction(line: &str) -> std::result::Result<OperationKind, String> {
    let open = line
        .find('(')
        .ok_or_else(|| format!("missing '(' in '{}'", line))?;
    let close = line[open..]
        .find(')')
        .map(|offset| open + offset)
        .ok_or_else(|| format!("missing ')' in '{}'", line))?;

    let keyword = line[..open].trim();
    let inner = line[open + 1..close].trim();
    let args: Vec<&str> = if inner.is_empty() {
        Vec::new()
    } else {
        inner.split(',').map(str::trim).collect()
    };

    let kind = match keyword {
        "begin" => {
            expect_arity(keyword, &args, 1)?;
            OperationKind::Begin {
                txn: parse_txn(args[0])?,
            }
        }
        "beginRO" => {
            expect_arity(keyword, &args, 1)?;
            OperationKind::BeginReadOnly {
                txn: parse_txn(args[0])?,
            }
        }
        "R" => {
            expect_arity(keyword, &args, 2)?;
            OperationKind::Read {
                txn: parse_txn(args[0])?,
                var: parse_var(args[1])?,
            }
        }
        "W" => {
            expect_arity(keyword, &args, 3)?;
            OperationKind::Write {
                txn: parse_txn(args[0])?,
                var: parse_var(args[1])?,
                value: args[2]
                    .parse::<Value>()
                    .map_err(|_| format!("invalid value '{}'", args[2]))?,
            }
        }
        "end" => {
            expect_arity(keyword, &args, 1)?;
            OperationKind::End {
                txn: parse_txn(args[0])?,
            }
        }
        "fail" => {
            expect_arity(keyword, &args, 1)?;
            OperationKind::Fail {
                site: parse_site(args[0])?,
            }
        }
        "recover" => {
            expect_arity(keyword, &args, 1)?;
            OperationKind::Recover {
                site: parse_site(args[0])?,
            }
        }
        "dump" => {
            expect_arity(keyword, &args, 0)?;
            OperationKind::Dump
        }
        other => return Err(format!("unknown instruction '{}'", other)),
    };

    Ok(kind)
}

fn expect_arity(keyword: &str, args: &[&str], expected: usize) -> std::result::Result<(), String> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(format!(
            "'{}' takes {} argument(s), got {}",
            keyword,
            expected,
            args.len()
        ))
    }
}

fn parse_prefixed(arg: &str, prefix: char, what: &str) -> std::result::Result<u32, String> {
    arg.strip_prefix(prefix)
        .and_then(|digits| digits.parse::<u32>().ok())
        .ok_or_else(|| format!("invalid {} '{}'", what, arg))
}

fn parse_txn(arg: &str) -> std::result::Result<TxnId, String> {
    parse_prefixed(arg, 'T', "transaction").map(TxnId)
}

fn parse_var(arg: &str) -> std::result::Result<VarId, String> {
    match parse_prefixed(arg, 'x', "variable")? {
        0 => Err(format!("invalid variable '{}'", arg)),
        n => Ok(VarId(n)),
    }
}

fn parse_site(arg: &str) -> std::result::Result<SiteId, String> {
    arg.parse::<u32>()
        .map(SiteId)
        .map_err(|_| format!("invalid site '{}'", arg))
}
