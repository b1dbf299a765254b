//! In-process driver backed by a `HashMap`, for tests and local development.
//!
//! Predicate commands (`EXISTS` on one key, `HEXISTS`, `SISMEMBER`, `SETNX` and a
//! refused `SET NX|XX`) reply with booleans rather than integers.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use regex::Regex;

use super::{Driver, FromConfig, TransactionBlock};
use crate::config::DriverConfig;
use crate::error::{RedisFacadeError, Result};
use crate::types::{DriverKind, Value};

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    Str(Vec<u8>),
    Hash(BTreeMap<String, Vec<u8>>),
    List(VecDeque<Vec<u8>>),
    Set(BTreeSet<Vec<u8>>),
}

impl Entry {
    fn type_name(&self) -> &'static str {
        match self {
            Entry::Str(_) => "string",
            Entry::Hash(_) => "hash",
            Entry::List(_) => "list",
            Entry::Set(_) => "set",
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryDriver {
    store: HashMap<String, Entry>,
    tx_replies: Option<Vec<Value>>,
}

impl MemoryDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn execute(&mut self, command: &str, args: &[Value]) -> Result<Value> {
        let flattened;
        let args = if args.iter().any(|arg| matches!(arg, Value::Array(_))) {
            flattened = flatten_args(args);
            flattened.as_slice()
        } else {
            args
        };
        let name = command.to_ascii_uppercase();
        match name.as_str() {
            "PING" => {
                arity(&name, args, 0, Some(1))?;
                Ok(args.first().cloned().unwrap_or_else(|| Value::from("PONG")))
            }
            "ECHO" => {
                arity(&name, args, 1, Some(1))?;
                Ok(args[0].clone())
            }
            "GET" => {
                arity(&name, args, 1, Some(1))?;
                match self.store.get(&key(&args[0])) {
                    None => Ok(Value::Nil),
                    Some(Entry::Str(bytes)) => Ok(Value::from(bytes.clone())),
                    Some(_) => Err(wrong_type()),
                }
            }
            "SET" => self.set(&name, args),
            "SETNX" => {
                arity(&name, args, 2, Some(2))?;
                let key = key(&args[0]);
                if self.store.contains_key(&key) {
                    return Ok(Value::Bool(false));
                }
                self.store.insert(key, Entry::Str(args[1].to_bytes()));
                Ok(Value::Bool(true))
            }
            "MGET" => {
                arity(&name, args, 1, None)?;
                let replies = args
                    .iter()
                    .map(|arg| match self.store.get(&key(arg)) {
                        Some(Entry::Str(bytes)) => Value::from(bytes.clone()),
                        _ => Value::Nil,
                    })
                    .collect();
                Ok(Value::Array(replies))
            }
            "MSET" => {
                arity(&name, args, 2, None)?;
                if args.len() % 2 != 0 {
                    return Err(wrong_arity(&name));
                }
                for pair in args.chunks(2) {
                    self.store.insert(key(&pair[0]), Entry::Str(pair[1].to_bytes()));
                }
                Ok(Value::from("OK"))
            }
            "DEL" => {
                arity(&name, args, 1, None)?;
                let removed = args
                    .iter()
                    .filter(|arg| self.store.remove(&key(arg)).is_some())
                    .count();
                Ok(int(removed))
            }
            "EXISTS" => {
                arity(&name, args, 1, None)?;
                if args.len() == 1 {
                    return Ok(Value::Bool(self.store.contains_key(&key(&args[0]))));
                }
                let found = args
                    .iter()
                    .filter(|arg| self.store.contains_key(&key(arg)))
                    .count();
                Ok(int(found))
            }
            "INCR" => {
                arity(&name, args, 1, Some(1))?;
                self.incr_by(&args[0], 1)
            }
            "DECR" => {
                arity(&name, args, 1, Some(1))?;
                self.incr_by(&args[0], -1)
            }
            "INCRBY" | "DECRBY" => {
                arity(&name, args, 2, Some(2))?;
                let delta = args[1].as_int().ok_or_else(not_an_integer)?;
                let delta = if name == "DECRBY" {
                    delta.checked_neg().ok_or_else(overflow)?
                } else {
                    delta
                };
                self.incr_by(&args[0], delta)
            }
            "APPEND" => {
                arity(&name, args, 2, Some(2))?;
                let entry = self
                    .store
                    .entry(key(&args[0]))
                    .or_insert_with(|| Entry::Str(Vec::new()));
                let Entry::Str(bytes) = entry else {
                    return Err(wrong_type());
                };
                bytes.extend(args[1].to_bytes());
                Ok(int(bytes.len()))
            }
            "STRLEN" => {
                arity(&name, args, 1, Some(1))?;
                match self.store.get(&key(&args[0])) {
                    None => Ok(Value::Int(0)),
                    Some(Entry::Str(bytes)) => Ok(int(bytes.len())),
                    Some(_) => Err(wrong_type()),
                }
            }
            "KEYS" => {
                arity(&name, args, 1, Some(1))?;
                let pattern = glob_to_regex(&key(&args[0]))?;
                let mut keys: Vec<&String> =
                    self.store.keys().filter(|k| pattern.is_match(k)).collect();
                keys.sort();
                Ok(Value::Array(
                    keys.into_iter().map(|k| Value::from(k.as_str())).collect(),
                ))
            }
            "TYPE" => {
                arity(&name, args, 1, Some(1))?;
                Ok(Value::from(
                    self.store
                        .get(&key(&args[0]))
                        .map_or("none", Entry::type_name),
                ))
            }
            "DBSIZE" => {
                arity(&name, args, 0, Some(0))?;
                Ok(int(self.store.len()))
            }
            "FLUSHDB" | "FLUSHALL" => {
                self.store.clear();
                Ok(Value::from("OK"))
            }
            "HSET" => {
                arity(&name, args, 3, None)?;
                if args.len() % 2 == 0 {
                    return Err(wrong_arity(&name));
                }
                let hash = self.hash_mut(&args[0])?;
                let added = args[1..]
                    .chunks(2)
                    .filter(|pair| hash.insert(key(&pair[0]), pair[1].to_bytes()).is_none())
                    .count();
                Ok(int(added))
            }
            "HGET" => {
                arity(&name, args, 2, Some(2))?;
                Ok(self
                    .hash(&args[0])?
                    .and_then(|hash| hash.get(&key(&args[1])))
                    .map_or(Value::Nil, |bytes| Value::from(bytes.clone())))
            }
            "HDEL" => {
                arity(&name, args, 2, None)?;
                let Some(hash) = self.hash_existing_mut(&args[0])? else {
                    return Ok(Value::Int(0));
                };
                let removed = args[1..]
                    .iter()
                    .filter(|field| hash.remove(&key(field)).is_some())
                    .count();
                self.drop_if_empty(&args[0]);
                Ok(int(removed))
            }
            "HEXISTS" => {
                arity(&name, args, 2, Some(2))?;
                Ok(Value::Bool(
                    self.hash(&args[0])?
                        .is_some_and(|hash| hash.contains_key(&key(&args[1]))),
                ))
            }
            "HGETALL" => {
                arity(&name, args, 1, Some(1))?;
                let mut replies = Vec::new();
                if let Some(hash) = self.hash(&args[0])? {
                    for (field, bytes) in hash {
                        replies.push(Value::from(field.as_str()));
                        replies.push(Value::from(bytes.clone()));
                    }
                }
                Ok(Value::Array(replies))
            }
            "LPUSH" | "RPUSH" => {
                arity(&name, args, 2, None)?;
                let list = self.list_mut(&args[0])?;
                for arg in &args[1..] {
                    if name == "LPUSH" {
                        list.push_front(arg.to_bytes());
                    } else {
                        list.push_back(arg.to_bytes());
                    }
                }
                Ok(int(list.len()))
            }
            "LPOP" | "RPOP" => {
                arity(&name, args, 1, Some(1))?;
                let Some(list) = self.list_existing_mut(&args[0])? else {
                    return Ok(Value::Nil);
                };
                let popped = if name == "LPOP" {
                    list.pop_front()
                } else {
                    list.pop_back()
                };
                self.drop_if_empty(&args[0]);
                Ok(popped.map_or(Value::Nil, Value::from))
            }
            "LLEN" => {
                arity(&name, args, 1, Some(1))?;
                Ok(int(self.list(&args[0])?.map_or(0, VecDeque::len)))
            }
            "LRANGE" => {
                arity(&name, args, 3, Some(3))?;
                let start = args[1].as_int().ok_or_else(not_an_integer)?;
                let stop = args[2].as_int().ok_or_else(not_an_integer)?;
                let Some(list) = self.list(&args[0])? else {
                    return Ok(Value::Array(Vec::new()));
                };
                let replies = match range_bounds(start, stop, list.len()) {
                    Some((from, to)) => list
                        .iter()
                        .skip(from)
                        .take(to - from + 1)
                        .map(|bytes| Value::from(bytes.clone()))
                        .collect(),
                    None => Vec::new(),
                };
                Ok(Value::Array(replies))
            }
            "SADD" => {
                arity(&name, args, 2, None)?;
                let set = self.set_mut(&args[0])?;
                let added = args[1..]
                    .iter()
                    .filter(|member| set.insert(member.to_bytes()))
                    .count();
                Ok(int(added))
            }
            "SREM" => {
                arity(&name, args, 2, None)?;
                let Some(set) = self.set_existing_mut(&args[0])? else {
                    return Ok(Value::Int(0));
                };
                let removed = args[1..]
                    .iter()
                    .filter(|member| set.remove(&member.to_bytes()))
                    .count();
                self.drop_if_empty(&args[0]);
                Ok(int(removed))
            }
            "SISMEMBER" => {
                arity(&name, args, 2, Some(2))?;
                Ok(Value::Bool(
                    self.set_ref(&args[0])?
                        .is_some_and(|set| set.contains(&args[1].to_bytes())),
                ))
            }
            "SMEMBERS" => {
                arity(&name, args, 1, Some(1))?;
                Ok(Value::Array(self.set_ref(&args[0])?.map_or_else(Vec::new, |set| {
                    set.iter().map(|bytes| Value::from(bytes.clone())).collect()
                })))
            }
            _ => Err(RedisFacadeError::CommandError(format!(
                "ERR unknown command '{command}'"
            ))),
        }
    }

    fn set(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        arity(name, args, 2, Some(3))?;
        let key = key(&args[0]);
        let condition = args.get(2).map(|flag| key_text(flag).to_ascii_uppercase());
        let exists = self.store.contains_key(&key);
        match condition.as_deref() {
            None => {}
            Some("NX") if exists => return Ok(Value::Bool(false)),
            Some("XX") if !exists => return Ok(Value::Bool(false)),
            Some("NX" | "XX") => {}
            Some(_) => {
                return Err(RedisFacadeError::CommandError("ERR syntax error".into()));
            }
        }
        self.store.insert(key, Entry::Str(args[1].to_bytes()));
        Ok(Value::from("OK"))
    }

    fn incr_by(&mut self, key_arg: &Value, delta: i64) -> Result<Value> {
        let entry = self
            .store
            .entry(key(key_arg))
            .or_insert_with(|| Entry::Str(b"0".to_vec()));
        let Entry::Str(bytes) = entry else {
            return Err(wrong_type());
        };
        let current: i64 = std::str::from_utf8(bytes)
            .ok()
            .and_then(|text| text.parse().ok())
            .ok_or_else(not_an_integer)?;
        let next = current.checked_add(delta).ok_or_else(overflow)?;
        *bytes = next.to_string().into_bytes();
        Ok(Value::Int(next))
    }

    fn drop_if_empty(&mut self, key_arg: &Value) {
        let key = key(key_arg);
        let empty = match self.store.get(&key) {
            Some(Entry::Hash(hash)) => hash.is_empty(),
            Some(Entry::List(list)) => list.is_empty(),
            Some(Entry::Set(set)) => set.is_empty(),
            _ => false,
        };
        if empty {
            self.store.remove(&key);
        }
    }

    fn hash(&self, key_arg: &Value) -> Result<Option<&BTreeMap<String, Vec<u8>>>> {
        match self.store.get(&key(key_arg)) {
            None => Ok(None),
            Some(Entry::Hash(hash)) => Ok(Some(hash)),
            Some(_) => Err(wrong_type()),
        }
    }

    fn hash_mut(&mut self, key_arg: &Value) -> Result<&mut BTreeMap<String, Vec<u8>>> {
        match self
            .store
            .entry(key(key_arg))
            .or_insert_with(|| Entry::Hash(BTreeMap::new()))
        {
            Entry::Hash(hash) => Ok(hash),
            _ => Err(wrong_type()),
        }
    }

    fn hash_existing_mut(
        &mut self,
        key_arg: &Value,
    ) -> Result<Option<&mut BTreeMap<String, Vec<u8>>>> {
        match self.store.get_mut(&key(key_arg)) {
            None => Ok(None),
            Some(Entry::Hash(hash)) => Ok(Some(hash)),
            Some(_) => Err(wrong_type()),
        }
    }

    fn list(&self, key_arg: &Value) -> Result<Option<&VecDeque<Vec<u8>>>> {
        match self.store.get(&key(key_arg)) {
            None => Ok(None),
            Some(Entry::List(list)) => Ok(Some(list)),
            Some(_) => Err(wrong_type()),
        }
    }

    fn list_mut(&mut self, key_arg: &Value) -> Result<&mut VecDeque<Vec<u8>>> {
        match self
            .store
            .entry(key(key_arg))
            .or_insert_with(|| Entry::List(VecDeque::new()))
        {
            Entry::List(list) => Ok(list),
            _ => Err(wrong_type()),
        }
    }

    fn list_existing_mut(&mut self, key_arg: &Value) -> Result<Option<&mut VecDeque<Vec<u8>>>> {
        match self.store.get_mut(&key(key_arg)) {
            None => Ok(None),
            Some(Entry::List(list)) => Ok(Some(list)),
            Some(_) => Err(wrong_type()),
        }
    }

    fn set_ref(&self, key_arg: &Value) -> Result<Option<&BTreeSet<Vec<u8>>>> {
        match self.store.get(&key(key_arg)) {
            None => Ok(None),
            Some(Entry::Set(set)) => Ok(Some(set)),
            Some(_) => Err(wrong_type()),
        }
    }

    fn set_mut(&mut self, key_arg: &Value) -> Result<&mut BTreeSet<Vec<u8>>> {
        match self
            .store
            .entry(key(key_arg))
            .or_insert_with(|| Entry::Set(BTreeSet::new()))
        {
            Entry::Set(set) => Ok(set),
            _ => Err(wrong_type()),
        }
    }

    fn set_existing_mut(&mut self, key_arg: &Value) -> Result<Option<&mut BTreeSet<Vec<u8>>>> {
        match self.store.get_mut(&key(key_arg)) {
            None => Ok(None),
            Some(Entry::Set(set)) => Ok(Some(set)),
            Some(_) => Err(wrong_type()),
        }
    }
}

impl Driver for MemoryDriver {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn invoke(&mut self, command: &str, args: &[Value]) -> Result<Value> {
        let reply = self.execute(command, args)?;
        if let Some(replies) = self.tx_replies.as_mut() {
            replies.push(reply.clone());
        }
        Ok(reply)
    }

    fn transaction(&mut self, block: TransactionBlock<'_>) -> Result<Value> {
        if self.tx_replies.is_some() {
            return Err(RedisFacadeError::CommandError(
                "ERR MULTI calls can not be nested".into(),
            ));
        }
        let snapshot = self.store.clone();
        self.tx_replies = Some(Vec::new());
        let outcome = block(self);
        let replies = self.tx_replies.take().unwrap_or_default();
        match outcome {
            Ok(()) => Ok(Value::Array(replies)),
            Err(err) => {
                self.store = snapshot;
                Err(err)
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl FromConfig for MemoryDriver {
    const TYPE_NAME: &'static str = DriverKind::Memory.type_name();

    fn from_config(_config: &DriverConfig) -> Result<Self> {
        Ok(Self::new())
    }
}

fn key(arg: &Value) -> String {
    key_text(arg).into_owned()
}

fn key_text(arg: &Value) -> std::borrow::Cow<'_, str> {
    match arg {
        Value::Text(text) => std::borrow::Cow::Borrowed(text.as_str()),
        other => std::borrow::Cow::Owned(String::from_utf8_lossy(&other.to_bytes()).into_owned()),
    }
}

/// Array arguments are spread into positional arguments, nested ones included.
fn flatten_args(args: &[Value]) -> Vec<Value> {
    let mut flat = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            Value::Array(items) => flat.extend(flatten_args(items)),
            other => flat.push(other.clone()),
        }
    }
    flat
}

fn int(n: usize) -> Value {
    Value::Int(i64::try_from(n).unwrap_or(i64::MAX))
}

fn arity(name: &str, args: &[Value], min: usize, max: Option<usize>) -> Result<()> {
    if args.len() < min || max.is_some_and(|max| args.len() > max) {
        return Err(wrong_arity(name));
    }
    Ok(())
}

fn wrong_arity(name: &str) -> RedisFacadeError {
    RedisFacadeError::CommandError(format!(
        "ERR wrong number of arguments for '{}' command",
        name.to_ascii_lowercase()
    ))
}

fn wrong_type() -> RedisFacadeError {
    RedisFacadeError::CommandError(
        "WRONGTYPE Operation against a key holding the wrong kind of value".into(),
    )
}

fn not_an_integer() -> RedisFacadeError {
    RedisFacadeError::CommandError("ERR value is not an integer or out of range".into())
}

fn overflow() -> RedisFacadeError {
    RedisFacadeError::CommandError("ERR increment or decrement would overflow".into())
}

/// Inclusive `[from, to]` indices for `LRANGE`, with negative offsets from the tail.
fn range_bounds(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = i64::try_from(len).ok()?;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return None;
    }
    Some((usize::try_from(start).ok()?, usize::try_from(stop).ok()?))
}

fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut source = String::from("^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            '[' => {
                source.push('[');
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    if c == '\\' || c == '[' {
                        source.push('\\');
                    }
                    source.push(c);
                }
                source.push(']');
            }
            '\\' => {
                if let Some(escaped) = chars.next() {
                    source.push_str(&regex::escape(&escaped.to_string()));
                }
            }
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');
    Regex::new(&source)
        .map_err(|err| RedisFacadeError::CommandError(format!("ERR invalid pattern: {err}")))
}
