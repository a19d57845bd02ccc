//! Modem session
//!
//! A [`ModemSession`] owns the byte stream to the modem and runs one AT
//! exchange at a time over it: write a command, collect the answer, parse it.

use super::device::ModemReset;
use super::logger::Transcript;
use super::protocol::line::{read_byte, read_line_from, CRLF};
use super::protocol::response::accept_line;
use super::protocol::{parse_answer, Arg, Command, ModemError, Pdu, RawAnswer, Value};
use super::transport::{open_serial, ModemStream, SerialConfig, TransportError};
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_serial::SerialStream;

/// Ends the message body after the `>` prompt
pub const CTRL_Z: u8 = 0x1A;

/// Bytes read while waiting for the `>` prompt
const PROMPT_LEN: usize = 4;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Opened, initialization chat not run yet
    Uninitialized,
    /// Vendor reset sequence in progress
    Resetting,
    /// Idle, ready for a command
    Ready,
    /// Writing a command
    Sending,
    /// Reading the answer to a command
    AwaitingAnswer,
    /// Stream shut down or lost
    Closed,
}

/// Commands sent by [`ModemSession::initialize`], in order
pub fn init_commands() -> [Command; 4] {
    [
        Command::new(""),
        Command::new("E0"),
        Command::new("Z"),
        Command::new("+CMEE=").arg(2),
    ]
}

/// A single modem connection
pub struct ModemSession<S> {
    stream: S,
    read_timeout: Duration,
    state: SessionState,
    transcript: Option<Transcript>,
}

impl ModemSession<SerialStream> {
    /// Open the serial device described by `config`
    ///
    /// The port is released when the session is dropped.
    pub fn open(config: &SerialConfig) -> Result<Self, ModemError> {
        let stream = open_serial(config)?;
        tracing::info!("opened {}", config.connection_info());
        Ok(Self::new(stream, config.read_timeout))
    }
}

impl<S: ModemStream> ModemSession<S> {
    /// Wrap an already open stream
    pub fn new(stream: S, read_timeout: Duration) -> Self {
        Self {
            stream,
            read_timeout,
            state: SessionState::Uninitialized,
            transcript: None,
        }
    }

    /// Record all traffic into `transcript`
    #[must_use]
    pub fn with_transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = Some(transcript);
        self
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Per-byte read timeout
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Transcript, if one is attached
    pub fn transcript(&self) -> Option<&Transcript> {
        self.transcript.as_ref()
    }

    /// Send `command` and parse the answer with the default parser
    pub async fn chat(&mut self, command: &Command) -> Result<Value, ModemError> {
        self.chat_with(command, |name, raw| Ok(parse_answer(name, raw)))
            .await
    }

    /// Send `command` and hand the answer to `parser`
    ///
    /// `parser` receives the command name (without `AT`) and the information
    /// lines. Its error is returned as is.
    pub async fn chat_with<T, F>(&mut self, command: &Command, parser: F) -> Result<T, ModemError>
    where
        F: FnOnce(&str, RawAnswer) -> Result<T, ModemError>,
    {
        self.ensure_open()?;
        let idle = self.state;

        self.state = SessionState::Sending;
        let result = match self.write_raw(command.to_wire().as_bytes()).await {
            Ok(()) => {
                self.state = SessionState::AwaitingAnswer;
                self.read_answer().await
            }
            Err(e) => Err(e),
        };

        let result = result.and_then(|raw| parser(command.name(), raw));
        self.settle(idle, result)
    }

    /// Run the initialization chat: `AT`, `ATE0`, `ATZ`, `AT+CMEE=2`
    ///
    /// Stops at the first failing command.
    pub async fn initialize(&mut self) -> Result<(), ModemError> {
        for command in init_commands() {
            self.chat(&command).await?;
        }
        self.state = SessionState::Ready;
        tracing::info!("modem initialized");
        Ok(())
    }

    /// Run a vendor reset sequence over the stream
    pub async fn reset_with<R>(&mut self, reset: &mut R) -> Result<(), ModemError>
    where
        R: ModemReset + ?Sized,
    {
        self.ensure_open()?;
        self.state = SessionState::Resetting;
        if let Some(t) = self.transcript.as_mut() {
            t.log_info("reset");
        }

        match reset.reset(&mut self.stream, self.read_timeout).await {
            Ok(()) => {
                self.state = SessionState::Ready;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("modem reset failed: {}", e);
                self.settle(SessionState::Uninitialized, Err(e))
            }
        }
    }

    /// Write bytes as is
    pub async fn write_raw(&mut self, data: &[u8]) -> Result<(), ModemError> {
        tracing::debug!("send : {:?}", String::from_utf8_lossy(data));
        if let Some(t) = self.transcript.as_mut() {
            t.log_tx(data);
        }
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read up to `n` bytes
    ///
    /// Stops early, without error, when a byte does not arrive within the
    /// read timeout.
    pub async fn read_raw(&mut self, n: usize) -> Result<Vec<u8>, ModemError> {
        let mut data = Vec::with_capacity(n);
        while data.len() < n {
            match read_byte(&mut self.stream, self.read_timeout).await {
                Ok(byte) => data.push(byte),
                Err(e) if e.is_timeout() => break,
                Err(e) => return Err(e),
            }
        }
        tracing::debug!("recv : {:?}", String::from_utf8_lossy(&data));
        if let Some(t) = self.transcript.as_mut() {
            t.log_rx(&data);
        }
        Ok(data)
    }

    /// Read one trimmed line
    pub async fn read_line(&mut self) -> Result<String, ModemError> {
        self.read_line_after(BytesMut::new()).await
    }

    async fn read_line_after(&mut self, head: BytesMut) -> Result<String, ModemError> {
        let line = read_line_from(&mut self.stream, head, self.read_timeout).await?;
        if !line.is_empty() {
            if let Some(t) = self.transcript.as_mut() {
                t.log_rx(line.as_bytes());
            }
        }
        Ok(line)
    }

    /// Read lines until `OK` or an error line
    pub async fn read_answer(&mut self) -> Result<RawAnswer, ModemError> {
        let mut answer = RawAnswer::default();
        loop {
            let line = self.read_line().await?;
            if accept_line(&mut answer, line)? {
                return Ok(answer);
            }
        }
    }

    /// Wait for the `>` prompt that follows `AT+CMGS`
    ///
    /// Reads up to four bytes, stopping early when the modem goes quiet
    /// after at least one byte. Without a `>` among them, the bytes are the start of
    /// an answer: an error line is returned as its [`AtError`], anything else
    /// as [`ModemError::UnexpectedAnswer`].
    ///
    /// [`AtError`]: super::protocol::AtError
    pub async fn await_prompt(&mut self) -> Result<(), ModemError> {
        let mut head = BytesMut::with_capacity(PROMPT_LEN);
        while head.len() < PROMPT_LEN {
            match read_byte(&mut self.stream, self.read_timeout).await {
                Ok(byte) => head.extend_from_slice(&[byte]),
                // A bare "> " is a complete prompt
                Err(e) if e.is_timeout() && !head.is_empty() => break,
                Err(e) => return Err(e),
            }
        }
        if head.contains(&b'>') {
            tracing::debug!("recv : {:?}", String::from_utf8_lossy(&head));
            if let Some(t) = self.transcript.as_mut() {
                t.log_rx(&head);
            }
            return Ok(());
        }

        let mut answer = RawAnswer::default();
        while let Some(pos) = head.windows(CRLF.len()).position(|w| w == CRLF) {
            let line = head.split_to(pos + CRLF.len());
            let line = String::from_utf8_lossy(&line).trim().to_string();
            if accept_line(&mut answer, line)? {
                return Err(unexpected_prompt(answer));
            }
        }
        let mut head = Some(head);
        loop {
            let line = self.read_line_after(head.take().unwrap_or_default()).await?;
            if accept_line(&mut answer, line)? {
                return Err(unexpected_prompt(answer));
            }
        }
    }

    /// Send a text-mode SMS
    ///
    /// Returns the parsed `+CMGS` answer, usually the message reference.
    pub async fn send_text_sms(&mut self, number: &str, text: &str) -> Result<Value, ModemError> {
        self.chat(&Command::new("+CMGF=").arg(1)).await?;
        let submit = Command::new("+CMGS=").arg(number);
        self.send_body(&submit, text.as_bytes()).await
    }

    /// Send a PDU-mode SMS
    pub async fn send_pdu_sms(&mut self, pdu: &Pdu) -> Result<Value, ModemError> {
        self.chat(&Command::new("+CMGF=").arg(0)).await?;
        let length = i64::try_from(pdu.tpdu_length()).unwrap_or(i64::MAX);
        let submit = Command::new("+CMGS=").arg(Arg::Int(length));
        self.send_body(&submit, pdu.to_hex().as_bytes()).await
    }

    async fn send_body(&mut self, submit: &Command, body: &[u8]) -> Result<Value, ModemError> {
        self.ensure_open()?;
        let idle = self.state;

        self.state = SessionState::Sending;
        let result = async {
            self.write_raw(submit.to_wire().as_bytes()).await?;
            self.await_prompt().await?;
            self.write_raw(body).await?;
            self.write_raw(&[CTRL_Z]).await?;
            self.state = SessionState::AwaitingAnswer;
            let raw = self.read_answer().await?;
            Ok::<_, ModemError>(parse_answer(submit.name(), raw))
        }
        .await;
        self.settle(idle, result)
    }

    /// Shut the stream down
    pub async fn close(&mut self) -> Result<(), ModemError> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.state = SessionState::Closed;
        let flushed = match self.transcript.as_mut() {
            Some(t) => t.flush(),
            None => Ok(()),
        };
        self.stream.shutdown().await?;
        tracing::info!("session closed");
        flushed.map_err(|e| {
            tracing::warn!("transcript flush failed: {}", e);
            TransportError::IoError(e).into()
        })
    }

    fn ensure_open(&self) -> Result<(), ModemError> {
        match self.state {
            SessionState::Closed => Err(ModemError::Disconnected),
            _ => Ok(()),
        }
    }

    /// Return to `idle` after an exchange, or to `Closed` if the stream is gone
    fn settle<T>(&mut self, idle: SessionState, result: Result<T, ModemError>) -> Result<T, ModemError> {
        self.state = match result {
            Err(ModemError::Disconnected) => SessionState::Closed,
            _ => idle,
        };
        result
    }
}

fn unexpected_prompt(answer: RawAnswer) -> ModemError {
    let mut lines = answer.into_lines();
    if lines.is_empty() {
        lines.push("OK".to_string());
    }
    ModemError::UnexpectedAnswer {
        command: "+CMGS".to_string(),
        answer: lines.join(" / "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::AtError;
    use tokio_test::io::Builder;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn session(mock: tokio_test::io::Mock) -> ModemSession<tokio_test::io::Mock> {
        ModemSession::new(mock, TIMEOUT)
    }

    #[tokio::test]
    async fn test_chat_parses_answer() {
        let mock = Builder::new()
            .write(b"AT+CFUN?\r")
            .read(b"\r\n+CFUN: 1\r\n\r\nOK\r\n")
            .build();
        let mut session = session(mock);

        let value = session.chat(&Command::new("+CFUN?")).await.unwrap();
        assert_eq!(value, Value::Line("1".into()));
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_chat_with_custom_parser() {
        let mock = Builder::new()
            .write(b"AT+CSQ\r")
            .read(b"+CSQ: 15,99\r\nOK\r\n")
            .build();
        let mut session = session(mock);

        let rssi = session
            .chat_with(&Command::new("+CSQ"), |name, raw| {
                let value = parse_answer(name, raw);
                value
                    .as_line()
                    .and_then(|l| l.split(',').next())
                    .and_then(|n| n.parse::<u8>().ok())
                    .ok_or_else(|| ModemError::UnexpectedAnswer {
                        command: name.to_string(),
                        answer: value.to_string(),
                    })
            })
            .await
            .unwrap();
        assert_eq!(rssi, 15);
    }

    #[tokio::test]
    async fn test_initialize_sends_four_commands() {
        let mock = Builder::new()
            .write(b"AT\r")
            .read(b"OK\r\n")
            .write(b"ATE0\r")
            .read(b"ATE0\r\r\nOK\r\n")
            .write(b"ATZ\r")
            .read(b"OK\r\n")
            .write(b"AT+CMEE=2\r")
            .read(b"OK\r\n")
            .build();
        let mut session = session(mock);

        session.initialize().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_initialize_aborts_on_first_failure() {
        // Nothing after ATE0 is scripted: a further write would panic the mock
        let mock = Builder::new()
            .write(b"AT\r")
            .read(b"OK\r\n")
            .write(b"ATE0\r")
            .read(b"ERROR\r\n")
            .build();
        let mut session = session(mock);

        let err = session.initialize().await.unwrap_err();
        assert_eq!(err.at_error(), Some(&AtError::Generic("ERROR".into())));
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_eof_closes_session() {
        let mock = Builder::new().write(b"AT\r").read(b"O").build();
        let mut session = session(mock);

        let err = session.chat(&Command::new("")).await.unwrap_err();
        assert!(matches!(err, ModemError::Disconnected));
        assert_eq!(session.state(), SessionState::Closed);

        let err = session.chat(&Command::new("")).await.unwrap_err();
        assert!(matches!(err, ModemError::Disconnected));
    }

    #[tokio::test]
    async fn test_send_text_sms() {
        let mock = Builder::new()
            .write(b"AT+CMGF=1\r")
            .read(b"OK\r\n")
            .write(b"AT+CMGS=\"0123456789\"\r")
            .read(b"\r\n> ")
            .write(b"hello")
            .write(&[CTRL_Z])
            .read(b"\r\n+CMGS: 7\r\n\r\nOK\r\n")
            .build();
        let mut session = session(mock);

        let reference = session.send_text_sms("0123456789", "hello").await.unwrap();
        assert_eq!(reference, Value::Line("7".into()));
    }

    #[tokio::test]
    async fn test_send_pdu_sms() {
        let pdu = Pdu::submit("0123456789", "hello").unwrap();
        let mock = Builder::new()
            .write(b"AT+CMGF=0\r")
            .read(b"OK\r\n")
            .write(b"AT+CMGS=17\r")
            .read(b"\r\n> ")
            .write(b"0001000A811032547698000005E8329BFD06")
            .write(&[CTRL_Z])
            .read(b"+CMGS: 8\r\nOK\r\n")
            .build();
        let mut session = session(mock);

        session.send_pdu_sms(&pdu).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_prompt_then_quiet_modem() {
        let mock = Builder::new()
            .write(b"AT+CMGF=1\r")
            .read(b"OK\r\n")
            .write(b"AT+CMGS=\"0123456789\"\r")
            .read(b"> ")
            .wait(Duration::from_secs(30))
            .write(b"hello")
            .write(&[CTRL_Z])
            .read(b"\r\n+CMGS: 7\r\n\r\nOK\r\n")
            .build();
        let mut session = session(mock);

        let reference = session.send_text_sms("0123456789", "hello").await.unwrap();
        assert_eq!(reference, Value::Line("7".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_modem_has_no_prompt() {
        let mock = Builder::new().wait(Duration::from_secs(30)).build();
        let mut session = session(mock);

        let err = session.await_prompt().await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_sim_busy_instead_of_prompt() {
        let mock = Builder::new()
            .write(b"AT+CMGF=1\r")
            .read(b"OK\r\n")
            .write(b"AT+CMGS=\"0123456789\"\r")
            .read(b"\r\n+CMS ERROR: 14 SIM busy\r\n")
            .build();
        let mut session = session(mock);

        let err = session.send_text_sms("0123456789", "hello").await.unwrap_err();
        assert!(err.is_sim_busy());
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_short_error_line_instead_of_prompt() {
        let mock = Builder::new().read(b"ERROR\r\n").build();
        let mut session = session(mock);

        let err = session.await_prompt().await.unwrap_err();
        assert_eq!(err.at_error(), Some(&AtError::Generic("ERROR".into())));
    }

    #[tokio::test]
    async fn test_ok_instead_of_prompt() {
        let mock = Builder::new().read(b"OK\r\n").build();
        let mut session = session(mock);

        let err = session.await_prompt().await.unwrap_err();
        assert!(matches!(err, ModemError::UnexpectedAnswer { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_raw_stops_on_timeout() {
        let mock = Builder::new().read(b"ab").wait(Duration::from_secs(60)).build();
        let mut session = ModemSession::new(mock, Duration::from_secs(1));

        assert_eq!(session.read_raw(4).await.unwrap(), b"ab".to_vec());
    }

    #[tokio::test]
    async fn test_transcript_records_traffic() {
        let mock = Builder::new().write(b"ATE0\r").read(b"OK\r\n").build();
        let mut session = session(mock).with_transcript(Transcript::new());

        session.chat(&Command::new("E0")).await.unwrap();

        let entries = session.transcript().map(|t| t.entries().to_vec()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].data, b"ATE0\r".to_vec());
        assert_eq!(entries[1].data, b"OK".to_vec());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mock = Builder::new().build();
        let mut session = session(mock);

        session.close().await.unwrap();
        session.close().await.unwrap();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_close_reports_lost_transcript() {
        let path = std::path::Path::new("/dev/full");
        let transcript = Transcript::to_file(path, crate::core::logger::LogFormat::Text).unwrap();
        let mock = Builder::new().write(b"AT\r").read(b"OK\r\n").build();
        let mut session = session(mock).with_transcript(transcript);

        session.chat(&Command::new("")).await.unwrap();
        let err = session.close().await.unwrap_err();

        assert!(matches!(err, ModemError::Transport(_)));
        assert_eq!(session.state(), SessionState::Closed);
    }
}
