//! RouterOS API 的最小线协议实现
//!
//! 只覆盖本系统用到的部分：长度前缀的 word 编码、sentence 读写、
//! 6.43+ 的明文登录，以及 `!re` / `!done` / `!trap` 应答解析。
//! 不是通用协议栈。

use crate::error::{BackupError, Result};
use std::collections::HashMap;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// word 长度的变长编码（RouterOS API framing）
pub fn encode_length(len: u32) -> Vec<u8> {
    match len {
        0..=0x7F => vec![len as u8],
        0x80..=0x3FFF => {
            let v = len | 0x8000;
            vec![(v >> 8) as u8, v as u8]
        }
        0x4000..=0x1F_FFFF => {
            let v = len | 0xC0_0000;
            vec![(v >> 16) as u8, (v >> 8) as u8, v as u8]
        }
        0x20_0000..=0x0FFF_FFFF => {
            let v = len | 0xE000_0000;
            vec![(v >> 24) as u8, (v >> 16) as u8, (v >> 8) as u8, v as u8]
        }
        _ => vec![
            0xF0,
            (len >> 24) as u8,
            (len >> 16) as u8,
            (len >> 8) as u8,
            len as u8,
        ],
    }
}

/// 读取一个变长编码的 word 长度
pub async fn read_length<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u32> {
    let b0 = reader.read_u8().await? as u32;
    if b0 & 0x80 == 0 {
        return Ok(b0);
    }
    if b0 & 0xC0 == 0x80 {
        let b1 = reader.read_u8().await? as u32;
        return Ok(((b0 & !0x80) << 8) | b1);
    }
    if b0 & 0xE0 == 0xC0 {
        let b1 = reader.read_u8().await? as u32;
        let b2 = reader.read_u8().await? as u32;
        return Ok(((b0 & !0xC0) << 16) | (b1 << 8) | b2);
    }
    if b0 & 0xF0 == 0xE0 {
        let b1 = reader.read_u8().await? as u32;
        let b2 = reader.read_u8().await? as u32;
        let b3 = reader.read_u8().await? as u32;
        return Ok(((b0 & !0xE0) << 24) | (b1 << 16) | (b2 << 8) | b3);
    }
    // 0xF0 前缀：后随 4 字节大端长度
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).await?;
    Ok(u32::from_be_bytes(buf))
}

/// 写出一个 sentence：若干 word 加一个空 word 结尾
pub async fn write_sentence<W: AsyncWrite + Unpin>(writer: &mut W, words: &[String]) -> Result<()> {
    for word in words {
        let bytes = word.as_bytes();
        writer.write_all(&encode_length(bytes.len() as u32)).await?;
        writer.write_all(bytes).await?;
    }
    writer.write_all(&encode_length(0)).await?;
    writer.flush().await?;
    Ok(())
}

/// 读入一个完整 sentence，直到空 word
pub async fn read_sentence<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<String>> {
    let mut words = Vec::new();
    loop {
        let len = read_length(reader).await?;
        if len == 0 {
            return Ok(words);
        }
        let mut buf = vec![0u8; len as usize];
        reader.read_exact(&mut buf).await?;
        words.push(String::from_utf8_lossy(&buf).into_owned());
    }
}

/// 一条命令的应答：`!re` 行的属性集合
pub type Reply = Vec<HashMap<String, String>>;

/// 解析 `=key=value` 形式的属性 word
fn parse_attribute(word: &str) -> Option<(String, String)> {
    let rest = word.strip_prefix('=')?;
    let (key, value) = rest.split_once('=')?;
    Some((key.to_string(), value.to_string()))
}

/// 发送一条命令并收取应答，直到 `!done`
///
/// `!trap` / `!fatal` 转换为 Command 错误，消息取设备返回的 `message` 属性
pub async fn run_command<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    words: &[String],
) -> Result<Reply> {
    write_sentence(stream, words).await?;

    let mut rows = Vec::new();
    let mut trap: Option<String> = None;
    loop {
        let sentence = read_sentence(stream).await?;
        let Some(kind) = sentence.first() else {
            continue;
        };
        match kind.as_str() {
            "!re" => {
                let row: HashMap<String, String> = sentence[1..]
                    .iter()
                    .filter_map(|w| parse_attribute(w))
                    .collect();
                rows.push(row);
            }
            "!trap" => {
                let message = sentence[1..]
                    .iter()
                    .filter_map(|w| parse_attribute(w))
                    .find(|(k, _)| k == "message")
                    .map(|(_, v)| v)
                    .unwrap_or_else(|| "unknown error".to_string());
                trap = Some(message);
            }
            "!fatal" => {
                let message = sentence.get(1).cloned().unwrap_or_default();
                return Err(BackupError::Connection(format!("设备断开连接: {message}")));
            }
            "!done" => {
                return match trap {
                    Some(message) => Err(BackupError::Command(message)),
                    None => Ok(rows),
                };
            }
            _ => {}
        }
    }
}
