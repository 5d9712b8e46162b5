use crate::device::client::{DeviceUser, FetchWindow, RawPunch, TerminalConnector, TerminalSession};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

// Terminal command set (request/response frames over one TCP stream).
const CMD_CONNECT: u16 = 0x03E8;
const CMD_EXIT: u16 = 0x03E9;
const CMD_GET_TIME: u16 = 0x00C9;
const CMD_READ_USERS: u16 = 0x0009;
const CMD_READ_PUNCHES: u16 = 0x000D;

const REPLY_OK: u16 = 0x07D0;

const FRAME_MAGIC: [u8; 2] = [0x5A, 0x4B];
const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Refuse to allocate for absurd frame lengths; terminals hold at most a
/// few tens of thousands of log records.
const MAX_FRAME_LEN: u32 = 8 * 1024 * 1024;

/// Production `TerminalConnector` speaking the terminal's framed TCP
/// protocol. Everything above the `TerminalSession` seam is
/// protocol-agnostic; this adapter is the only place the framing lives.
pub struct TcpTerminalConnector {
    host: String,
    port: u16,
}

impl TcpTerminalConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

#[async_trait]
impl TerminalConnector for TcpTerminalConnector {
    async fn open(&self) -> Result<Box<dyn TerminalSession>> {
        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .with_context(|| format!("dialing terminal at {}:{}", self.host, self.port))?;
        stream.set_nodelay(true).ok();

        let mut session = TcpSession { stream };
        session
            .command(CMD_CONNECT, &[])
            .await
            .context("terminal connect handshake")?;
        Ok(Box::new(session))
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

struct TcpSession {
    stream: TcpStream,
}

impl TcpSession {
    /// One request/response exchange. Returns the reply payload or fails
    /// on any framing or non-OK reply.
    async fn command(&mut self, cmd: u16, payload: &[u8]) -> Result<Vec<u8>> {
        let mut frame = Vec::with_capacity(8 + payload.len());
        frame.extend_from_slice(&FRAME_MAGIC);
        frame.extend_from_slice(&cmd.to_le_bytes());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(payload);
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;

        let mut header = [0u8; 8];
        self.stream.read_exact(&mut header).await?;
        if header[0..2] != FRAME_MAGIC {
            bail!("bad frame magic from terminal: {:02x}{:02x}", header[0], header[1]);
        }
        let reply = u16::from_le_bytes([header[2], header[3]]);
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if len > MAX_FRAME_LEN {
            bail!("terminal frame length {} exceeds limit", len);
        }

        let mut body = vec![0u8; len as usize];
        self.stream.read_exact(&mut body).await?;

        if reply != REPLY_OK {
            bail!("terminal rejected command {:#06x} with reply {:#06x}", cmd, reply);
        }
        Ok(body)
    }
}

#[async_trait]
impl TerminalSession for TcpSession {
    async fn device_time(&mut self) -> Result<NaiveDateTime> {
        let body = self.command(CMD_GET_TIME, &[]).await?;
        let text = String::from_utf8(body).context("device time is not utf-8")?;
        NaiveDateTime::parse_from_str(text.trim(), TS_FORMAT)
            .with_context(|| format!("unparseable device time {:?}", text.trim()))
    }

    async fn read_users(&mut self) -> Result<Vec<DeviceUser>> {
        let body = self.command(CMD_READ_USERS, &[]).await?;
        let text = String::from_utf8(body).context("user listing is not utf-8")?;
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .map(parse_user_line)
            .collect()
    }

    async fn read_punches(&mut self, window: &FetchWindow) -> Result<Vec<RawPunch>> {
        let request = format!(
            "{}\t{}",
            window.from.format(TS_FORMAT),
            window.to.format(TS_FORMAT)
        );
        let body = self.command(CMD_READ_PUNCHES, request.as_bytes()).await?;
        let text = String::from_utf8(body).context("punch log is not utf-8")?;
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .map(parse_punch_line)
            .collect()
    }

    async fn close(&mut self) -> Result<()> {
        self.command(CMD_EXIT, &[]).await?;
        self.stream.shutdown().await.ok();
        Ok(())
    }
}

/// `device_user_id \t name \t card_no`
fn parse_user_line(line: &str) -> Result<DeviceUser> {
    let mut fields = line.split('\t');
    let id = fields.next().map(str::trim).unwrap_or_default();
    let name = fields.next().map(str::trim).unwrap_or_default();
    let card = fields.next().map(str::trim).filter(|c| !c.is_empty());
    if id.is_empty() {
        bail!("user record with empty id: {:?}", line);
    }
    Ok(DeviceUser {
        device_user_id: id.to_string(),
        name: name.to_string(),
        card_no: card.map(str::to_string),
    })
}

/// `device_user_id \t employee_no \t timestamp`; the middle field is
/// frequently empty on real terminals.
fn parse_punch_line(line: &str) -> Result<RawPunch> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 3 {
        bail!("malformed punch record: {:?}", line);
    }
    let id = fields[0].trim();
    if id.is_empty() {
        bail!("punch record with empty device user id: {:?}", line);
    }
    let employee_no = {
        let no = fields[1].trim();
        if no.is_empty() { None } else { Some(no.to_string()) }
    };
    let timestamp = NaiveDateTime::parse_from_str(fields[2].trim(), TS_FORMAT)
        .with_context(|| format!("unparseable punch timestamp {:?}", fields[2].trim()))?;
    Ok(RawPunch {
        device_user_id: id.to_string(),
        employee_no,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::{parse_punch_line, parse_user_line};

    #[test]
    fn punch_line_parses_all_fields() {
        let p = parse_punch_line("7\tEMP-007\t2024-01-10 08:59:00").expect("punch");
        assert_eq!(p.device_user_id, "7");
        assert_eq!(p.employee_no.as_deref(), Some("EMP-007"));
        assert_eq!(p.timestamp.to_string(), "2024-01-10 08:59:00");
    }

    #[test]
    fn punch_line_with_empty_employee_no() {
        let p = parse_punch_line("12\t\t2024-01-10 09:01:30").expect("punch");
        assert_eq!(p.employee_no, None);
    }

    #[test]
    fn malformed_punch_line_is_rejected() {
        assert!(parse_punch_line("7\t2024-01-10 08:59:00").is_err());
        assert!(parse_punch_line("\tEMP-007\t2024-01-10 08:59:00").is_err());
        assert!(parse_punch_line("7\tx\tnot-a-time").is_err());
    }

    #[test]
    fn user_line_card_no_is_optional() {
        let u = parse_user_line("7\tJohn Doe\t").expect("user");
        assert_eq!(u.card_no, None);
        let u = parse_user_line("7\tJohn Doe\t0012345").expect("user");
        assert_eq!(u.card_no.as_deref(), Some("0012345"));
    }
}
