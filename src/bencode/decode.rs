use std::collections::BTreeMap;

use bytes::Bytes;

use super::error::BencodeError;
use super::value::Value;

const MAX_DEPTH: usize = 64;

/// Decodes exactly one bencode value from `data`.
///
/// # Errors
///
/// Fails with [`BencodeError::PartialDecode`] when bytes remain after the
/// value, with [`BencodeError::UnexpectedEof`] when the input ends inside
/// one, and with syntax errors otherwise.
pub fn decode(data: &[u8]) -> Result<Value, BencodeError> {
    let (value, used) = decode_prefix(data)?;
    if used != data.len() {
        return Err(BencodeError::PartialDecode);
    }
    Ok(value)
}

/// Decodes one bencode value from the front of `data`, returning the value
/// and the number of bytes it occupied. Trailing bytes are left to the
/// caller, which lets a parser walk a container while tracking the raw
/// byte span of each element.
pub fn decode_prefix(data: &[u8]) -> Result<(Value, usize), BencodeError> {
    let mut parser = Parser { data, pos: 0 };
    let value = parser.value(0)?;
    Ok((value, parser.pos))
}

struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Result<u8, BencodeError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(BencodeError::UnexpectedEof)
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn value(&mut self, depth: usize) -> Result<Value, BencodeError> {
        if depth > MAX_DEPTH {
            return Err(BencodeError::NestingTooDeep);
        }
        match self.peek()? {
            b'i' => self.integer(),
            b'l' => self.list(depth),
            b'd' => self.dict(depth),
            b'0'..=b'9' => self.bytes().map(Value::Bytes),
            other => Err(BencodeError::UnexpectedByte(other)),
        }
    }

    fn integer(&mut self) -> Result<Value, BencodeError> {
        self.bump();
        let start = self.pos;
        while self.peek()? != b'e' {
            self.bump();
        }
        let body = &self.data[start..self.pos];
        self.bump();

        let text = std::str::from_utf8(body).map_err(|_| BencodeError::InvalidInteger)?;
        if text.is_empty()
            || text == "-"
            || text.starts_with("-0")
            || (text.len() > 1 && text.starts_with('0'))
        {
            return Err(BencodeError::InvalidInteger);
        }
        let n: i64 = text.parse().map_err(|_| BencodeError::InvalidInteger)?;
        Ok(Value::Integer(n))
    }

    fn bytes(&mut self) -> Result<Bytes, BencodeError> {
        let start = self.pos;
        while self.peek()? != b':' {
            if !self.peek()?.is_ascii_digit() {
                return Err(BencodeError::InvalidStringLength);
            }
            self.bump();
        }
        let len: usize = std::str::from_utf8(&self.data[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(BencodeError::InvalidStringLength)?;
        self.bump();

        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(BencodeError::UnexpectedEof)?;
        let bytes = Bytes::copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(bytes)
    }

    fn list(&mut self, depth: usize) -> Result<Value, BencodeError> {
        self.bump();
        let mut items = Vec::new();
        while self.peek()? != b'e' {
            items.push(self.value(depth + 1)?);
        }
        self.bump();
        Ok(Value::List(items))
    }

    fn dict(&mut self, depth: usize) -> Result<Value, BencodeError> {
        self.bump();
        let mut entries = BTreeMap::new();
        while self.peek()? != b'e' {
            let key = self.bytes()?;
            let value = self.value(depth + 1)?;
            entries.insert(key, value);
        }
        self.bump();
        Ok(Value::Dict(entries))
    }
}
