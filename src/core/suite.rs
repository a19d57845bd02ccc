//! GSM check suite
//!
//! Walks a modem through basic queries, phonebook, network registration, a
//! voice call and SMS sending. Outcomes go to a [`Reporter`]; steps that need
//! a human (is the phone ringing?) are asked through it as well.

use super::protocol::{
    parse_contact, parse_contact_range, Command, Contact, ModemError, Pdu, RetryPolicy, Value,
};
use super::session::ModemSession;
use super::transport::ModemStream;
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Expected `+IPR?` answer
pub const EXPECTED_BAUD_RATE: &str = "115200";

/// Text sent by the SMS sections
pub const DEFAULT_SMS_TEXT: &str = "hello";

/// Suite errors
#[derive(Error, Debug)]
pub enum SuiteError {
    /// Modem failure that ends the whole run
    #[error(transparent)]
    Modem(#[from] ModemError),

    /// A failure was recorded and the current section stopped
    #[error("Section aborted: {0}")]
    Aborted(String),
}

/// What a failing suite chat does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Record a failure and stop the section
    #[default]
    Fail,
    /// Log the error and carry on without a value
    Info,
    /// Hand the error to the caller untouched
    Raise,
}

/// Where suite outcomes go
#[async_trait]
pub trait Reporter: Send {
    /// Progress message
    async fn info(&mut self, message: &str);

    /// Outcome of a check
    async fn check(&mut self, ok: bool, description: &str);

    /// A failure
    async fn fail(&mut self, message: &str);

    /// Ask the operator to confirm what they observe
    async fn operator_confirm(&mut self, question: &str) -> bool;
}

/// Suite parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteSettings {
    /// Number to call and text; call and SMS sections are skipped without it
    pub callable_number: Option<String>,
    /// `name:number` expected in the SIM phonebook
    pub sim_contact: Option<String>,
    /// Text of the test messages
    pub sms_text: String,
    /// Retry around `+CPBR=?`, which the Calypso sometimes fails
    pub contact_range_retry: RetryPolicy,
    /// Retry around the text SMS send
    pub sms_retry: RetryPolicy,
    /// Retry around the PDU SMS send
    pub pdu_sms_retry: RetryPolicy,
}

impl Default for SuiteSettings {
    fn default() -> Self {
        Self {
            callable_number: None,
            sim_contact: None,
            sms_text: DEFAULT_SMS_TEXT.to_string(),
            contact_range_retry: RetryPolicy::any_error(5, Duration::from_secs(10)),
            sms_retry: RetryPolicy::sim_busy(3, Duration::from_secs(10)),
            pdu_sms_retry: RetryPolicy::sim_busy(5, Duration::from_secs(10)),
        }
    }
}

/// Counts of a suite run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SuiteReport {
    /// Checks that held
    pub passed: usize,
    /// Checks that did not hold, plus recorded failures
    pub failed: usize,
    /// Sections skipped for lack of configuration
    pub skipped: Vec<String>,
    /// Failure messages in order
    pub failures: Vec<String>,
    /// Phonebook read from the SIM
    pub contacts: Vec<Contact>,
}

impl SuiteReport {
    /// Whether nothing failed
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} passed, {} failed", self.passed, self.failed)?;
        if !self.skipped.is_empty() {
            write!(f, ", skipped: {}", self.skipped.join(", "))?;
        }
        Ok(())
    }
}

/// Settings and reporter passed to every section
pub struct SuiteContext<R> {
    /// Suite parameters
    pub settings: SuiteSettings,
    /// Outcome sink
    pub reporter: R,
    report: SuiteReport,
}

impl<R: Reporter> SuiteContext<R> {
    /// New context with an empty report
    pub fn new(settings: SuiteSettings, reporter: R) -> Self {
        Self {
            settings,
            reporter,
            report: SuiteReport::default(),
        }
    }

    /// Report so far
    pub fn report(&self) -> &SuiteReport {
        &self.report
    }

    /// Give back the reporter and the report
    pub fn finish(self) -> (R, SuiteReport) {
        (self.reporter, self.report)
    }

    async fn info(&mut self, message: &str) {
        tracing::info!("{}", message);
        self.reporter.info(message).await;
    }

    async fn check(&mut self, ok: bool, description: &str) -> bool {
        if ok {
            self.report.passed += 1;
        } else {
            tracing::warn!("check failed: {}", description);
            self.report.failed += 1;
            self.report.failures.push(description.to_string());
        }
        self.reporter.check(ok, description).await;
        ok
    }

    async fn fail(&mut self, message: &str) {
        tracing::error!("{}", message);
        self.report.failed += 1;
        self.report.failures.push(message.to_string());
        self.reporter.fail(message).await;
    }

    async fn confirm(&mut self, question: &str) -> bool {
        let ok = self.reporter.operator_confirm(question).await;
        self.check(ok, question).await
    }

    async fn skip(&mut self, section: Section, reason: &str) {
        self.info(reason).await;
        self.info(&format!("skip {} tests", section)).await;
        self.report.skipped.push(section.to_string());
    }
}

/// Suite sections, in run order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    /// Identification and serial settings, no SIM needed
    Basics,
    /// SIM phonebook
    Contacts,
    /// Network registration
    Network,
    /// Voice call
    Call,
    /// Text-mode SMS
    Sms,
    /// PDU-mode SMS
    PduSms,
}

impl Section {
    /// All sections in run order
    pub const ALL: [Section; 6] = [
        Section::Basics,
        Section::Contacts,
        Section::Network,
        Section::Call,
        Section::Sms,
        Section::PduSms,
    ];

    fn title(self) -> &'static str {
        match self {
            Section::Basics => "basics",
            Section::Contacts => "contacts",
            Section::Network => "network",
            Section::Call => "call",
            Section::Sms => "SMS",
            Section::PduSms => "PDU SMS",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl std::str::FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "basics" => Ok(Self::Basics),
            "contacts" => Ok(Self::Contacts),
            "network" => Ok(Self::Network),
            "call" => Ok(Self::Call),
            "sms" => Ok(Self::Sms),
            "pdu_sms" | "pdu" => Ok(Self::PduSms),
            other => Err(format!("unknown suite section '{other}'")),
        }
    }
}

/// Queries of the basics section, none of which need the SIM
const BASIC_QUERIES: [&str; 13] = [
    "+CMUX?", // multiplexing mode
    "+CGMM",  // model
    "+CGMR",  // firmware version
    "+CGMI",  // manufacturer
    "+IPR?",  // bit rate
    "ICF?",   // character framing
    "S3?",    // command line termination
    "S4?",    // response formatting
    "S5?",    // command line editing
    "+ICF?",  // TE-TA character framing
    "+IFC?",  // flow control, differs between Calypso and MC75i
    "+CSCS?", // character set
    "+CFUN?", // phone functionality
];

/// The suite, run over one session
pub struct GsmSuite<S, R> {
    session: ModemSession<S>,
    ctx: SuiteContext<R>,
}

impl<S: ModemStream, R: Reporter> GsmSuite<S, R> {
    /// Suite over `session`, which should already be reset
    pub fn new(session: ModemSession<S>, ctx: SuiteContext<R>) -> Self {
        Self { session, ctx }
    }

    /// Report so far
    pub fn report(&self) -> &SuiteReport {
        self.ctx.report()
    }

    /// Take back the session and the context
    pub fn into_parts(self) -> (ModemSession<S>, SuiteContext<R>) {
        (self.session, self.ctx)
    }

    /// Initialize the modem, then run every section
    pub async fn run_all(&mut self) -> Result<SuiteReport, SuiteError> {
        self.run(&Section::ALL).await
    }

    /// Initialize the modem, then run `sections` in the given order
    ///
    /// A section that records a failure is stopped and the next one starts.
    /// Losing the modem ends the run.
    pub async fn run(&mut self, sections: &[Section]) -> Result<SuiteReport, SuiteError> {
        if let Err(e) = self.session.initialize().await {
            self.ctx.fail(&format!("modem initialization failed: {}", e)).await;
            return Err(e.into());
        }

        for &section in sections {
            self.ctx.info(&format!("== Testing {} ==", section)).await;
            match self.run_section(section).await {
                Ok(()) => {}
                Err(SuiteError::Aborted(reason)) => {
                    tracing::info!("{} section aborted: {}", section, reason);
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!("suite finished: {}", self.ctx.report());
        Ok(self.ctx.report().clone())
    }

    /// Run one section without initializing first
    pub async fn run_section(&mut self, section: Section) -> Result<(), SuiteError> {
        match section {
            Section::Basics => self.basics().await,
            Section::Contacts => self.contacts().await,
            Section::Network => self.network().await,
            Section::Call => self.call().await,
            Section::Sms => self.sms().await,
            Section::PduSms => self.pdu_sms().await,
        }
    }

    /// Chat, handling a failure according to `policy`
    ///
    /// Returns `Ok(None)` when the chat failed under [`ErrorPolicy::Info`].
    pub async fn chat(&mut self, command: &Command, policy: ErrorPolicy) -> Result<Option<Value>, SuiteError> {
        let err = match self.session.chat(command).await {
            Ok(value) => return Ok(Some(value)),
            Err(e) => e,
        };

        let message = format!("when sending {} : {}", command, err);
        match policy {
            ErrorPolicy::Raise => Err(err.into()),
            ErrorPolicy::Info => {
                self.ctx.info(&message).await;
                Ok(None)
            }
            ErrorPolicy::Fail => {
                self.ctx.fail(&message).await;
                match err {
                    ModemError::Disconnected => Err(err.into()),
                    _ => Err(SuiteError::Aborted(message)),
                }
            }
        }
    }

    async fn expect(&mut self, command: Command) -> Result<Value, SuiteError> {
        // Under Fail a missing value is always an error
        self.chat(&command, ErrorPolicy::Fail)
            .await?
            .ok_or_else(|| SuiteError::Aborted(command.to_string()))
    }

    async fn abort(&mut self, message: String) -> Result<(), SuiteError> {
        self.ctx.fail(&message).await;
        Err(SuiteError::Aborted(message))
    }

    /// Identification and serial settings
    pub async fn basics(&mut self) -> Result<(), SuiteError> {
        for name in BASIC_QUERIES {
            let value = self.expect(Command::new(name)).await?;
            if name == "+IPR?" {
                let ok = value.as_line() == Some(EXPECTED_BAUD_RATE);
                self.ctx
                    .check(ok, &format!("check that baudrate == {}", EXPECTED_BAUD_RATE))
                    .await;
            }
        }
        Ok(())
    }

    /// Read the SIM phonebook and look for the configured contact
    pub async fn contacts(&mut self) -> Result<(), SuiteError> {
        self.expect(Command::new("+CPIN?")).await?;
        self.expect(Command::new("+CPBS=").arg("SM")).await?;

        let policy = self.ctx.settings.contact_range_retry.clone();
        let query = Command::new("+CPBR=?");
        let ranges = match policy
            .run(&mut self.session, |session| {
                let query = query.clone();
                async move { session.chat(&query).await }.boxed()
            })
            .await
        {
            Ok(value) => value,
            Err(ModemError::Disconnected) => return Err(ModemError::Disconnected.into()),
            Err(e) => return self.abort(format!("Can't get contact range: {}", e)).await,
        };

        let range = ranges.as_line().and_then(parse_contact_range);
        if !self.ctx.check(range.is_some(), "+CPBR=? returned a valid answer").await {
            return Ok(());
        }
        let Some(range) = range else {
            return Ok(());
        };

        let mut contacts = Vec::new();
        for index in range.indices() {
            let entry = self.expect(Command::new("+CPBR=").arg(index)).await?;
            if entry.is_empty() {
                continue;
            }
            let contact = entry.lines().first().and_then(|line| parse_contact(line));
            let description = format!("+CPBR={} returned a valid answer", index);
            if self.ctx.check(contact.is_some(), &description).await {
                contacts.extend(contact);
            }
        }
        tracing::info!("{} contacts on the SIM", contacts.len());

        self.find_contact(&contacts).await;
        self.ctx.report.contacts = contacts;
        Ok(())
    }

    async fn find_contact(&mut self, contacts: &[Contact]) {
        let Some(expected) = self.ctx.settings.sim_contact.clone() else {
            self.ctx.info("no SIM_CONTACT field in the conf file, skip test").await;
            return;
        };
        let Some((name, number)) = expected.split_once(':') else {
            self.ctx
                .fail(&format!("SIM_CONTACT {:?} is not of the form name:number", expected))
                .await;
            return;
        };

        let found = contacts.iter().any(|c| c.name == name);
        if !self.ctx.check(found, &format!("Find contact \"{}\" in the SIM", name)).await {
            return;
        }
        let ok = contacts.iter().any(|c| c.name == name && c.number == number);
        self.ctx
            .check(ok, &format!("Contact \"{}\" has number \"{}\"", name, number))
            .await;
    }

    /// Turn the radio on and register
    pub async fn network(&mut self) -> Result<(), SuiteError> {
        self.expect(Command::new("+CFUN=").arg(1)).await?;
        self.expect(Command::new("+COPS=").arg(0)).await?;
        self.expect(Command::new("+CREG?")).await?;
        Ok(())
    }

    fn callable_number(&self) -> Option<String> {
        self.ctx
            .settings
            .callable_number
            .clone()
            .filter(|n| !n.is_empty())
    }

    /// Place a call, have the operator watch it ring, hang up
    pub async fn call(&mut self) -> Result<(), SuiteError> {
        let Some(number) = self.callable_number() else {
            self.ctx
                .skip(Section::Call, "can't find a callable number in conf file")
                .await;
            return Ok(());
        };

        self.expect(Command::new(format!("D{};", number))).await?;
        self.ctx
            .confirm(&format!("number {} is ringing within ~30 seconds", number))
            .await;
        self.expect(Command::new("H")).await?;
        self.ctx.confirm("ringing stopped within ~10 seconds").await;
        Ok(())
    }

    /// Send a text-mode SMS
    pub async fn sms(&mut self) -> Result<(), SuiteError> {
        let Some(number) = self.callable_number() else {
            self.ctx
                .skip(Section::Sms, "can't find a callable number in conf file")
                .await;
            return Ok(());
        };

        let policy = self.ctx.settings.sms_retry.clone();
        let text = self.ctx.settings.sms_text.clone();
        let sent = policy
            .run(&mut self.session, |session| {
                let number = number.clone();
                let text = text.clone();
                async move { session.send_text_sms(&number, &text).await }.boxed()
            })
            .await;
        self.confirm_sent(sent, "SMS").await
    }

    /// Send a PDU-mode SMS
    pub async fn pdu_sms(&mut self) -> Result<(), SuiteError> {
        let Some(number) = self.callable_number() else {
            self.ctx
                .skip(Section::PduSms, "can't find a callable number in conf file")
                .await;
            return Ok(());
        };

        let pdu = match Pdu::submit(&number, &self.ctx.settings.sms_text) {
            Ok(pdu) => pdu,
            Err(e) => return self.abort(format!("can't build PDU: {}", e)).await,
        };
        let policy = self.ctx.settings.pdu_sms_retry.clone();
        let sent = policy
            .run(&mut self.session, |session| {
                let pdu = pdu.clone();
                async move { session.send_pdu_sms(&pdu).await }.boxed()
            })
            .await;
        self.confirm_sent(sent, "PDU SMS").await
    }

    async fn confirm_sent(&mut self, sent: Result<Value, ModemError>, kind: &str) -> Result<(), SuiteError> {
        match sent {
            Ok(_) => {
                let text = self.ctx.settings.sms_text.clone();
                self.ctx
                    .confirm(&format!("received SMS with text : '{}'", text))
                    .await;
                Ok(())
            }
            Err(ModemError::Disconnected) => Err(ModemError::Disconnected.into()),
            Err(e) => self.abort(format!("can't send {}: {}", kind, e)).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::{Builder, Mock};

    /// Records everything; answers confirmations from a script
    #[derive(Debug, Default)]
    struct RecordingReporter {
        infos: Vec<String>,
        checks: Vec<(bool, String)>,
        failures: Vec<String>,
        questions: Vec<String>,
        answers: Vec<bool>,
    }

    #[async_trait]
    impl Reporter for RecordingReporter {
        async fn info(&mut self, message: &str) {
            self.infos.push(message.to_string());
        }

        async fn check(&mut self, ok: bool, description: &str) {
            self.checks.push((ok, description.to_string()));
        }

        async fn fail(&mut self, message: &str) {
            self.failures.push(message.to_string());
        }

        async fn operator_confirm(&mut self, question: &str) -> bool {
            self.questions.push(question.to_string());
            if self.answers.is_empty() {
                true
            } else {
                self.answers.remove(0)
            }
        }
    }

    fn suite(mock: Mock, settings: SuiteSettings) -> GsmSuite<Mock, RecordingReporter> {
        let session = ModemSession::new(mock, Duration::from_secs(10));
        GsmSuite::new(session, SuiteContext::new(settings, RecordingReporter::default()))
    }

    fn with_number() -> SuiteSettings {
        SuiteSettings {
            callable_number: Some("0123456789".into()),
            ..SuiteSettings::default()
        }
    }

    #[tokio::test]
    async fn test_basics_checks_baud_rate() {
        let mut builder = Builder::new();
        for name in BASIC_QUERIES {
            builder.write(format!("AT{}\r", name).as_bytes());
            match name {
                "+IPR?" => builder.read(b"+IPR: 115200\r\nOK\r\n"),
                _ => builder.read(b"OK\r\n"),
            };
        }
        let mut suite = suite(builder.build(), SuiteSettings::default());

        suite.basics().await.unwrap();

        let (_, ctx) = suite.into_parts();
        let (reporter, report) = ctx.finish();
        assert_eq!(reporter.checks, vec![(true, "check that baudrate == 115200".to_string())]);
        assert_eq!(report.passed, 1);
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_fail_policy_aborts_section() {
        let mock = Builder::new()
            .write(b"AT+CMUX?\r")
            .read(b"+CME ERROR: 4\r\n")
            .build();
        let mut suite = suite(mock, SuiteSettings::default());

        let err = suite.basics().await.unwrap_err();
        assert!(matches!(err, SuiteError::Aborted(_)));

        let (_, ctx) = suite.into_parts();
        let (reporter, report) = ctx.finish();
        assert_eq!(reporter.failures, vec!["when sending AT+CMUX? : +CME ERROR: 4".to_string()]);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn test_info_and_raise_policies() {
        let mock = Builder::new()
            .write(b"AT+CLAC\r")
            .read(b"ERROR\r\n")
            .write(b"AT+CLAC\r")
            .read(b"ERROR\r\n")
            .build();
        let mut suite = suite(mock, SuiteSettings::default());
        let clac = Command::new("+CLAC");

        assert_eq!(suite.chat(&clac, ErrorPolicy::Info).await.unwrap(), None);
        let err = suite.chat(&clac, ErrorPolicy::Raise).await.unwrap_err();
        assert!(matches!(err, SuiteError::Modem(ModemError::At(_))));
        assert!(suite.report().is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_contacts_retries_range_and_finds_contact() {
        let mock = Builder::new()
            .write(b"AT+CPIN?\r")
            .read(b"+CPIN: READY\r\nOK\r\n")
            .write(b"AT+CPBS=\"SM\"\r")
            .read(b"OK\r\n")
            .write(b"AT+CPBR=?\r")
            .read(b"+CME ERROR: 14\r\n")
            .write(b"AT+CPBR=?\r")
            .read(b"+CPBR: (1-3),40,17\r\nOK\r\n")
            .write(b"AT+CPBR=1\r")
            .read(b"+CPBR: 1,\"+15551234\",145,\"Alice\"\r\nOK\r\n")
            .write(b"AT+CPBR=2\r")
            .read(b"OK\r\n")
            .write(b"AT+CPBR=3\r")
            .read(b"+CPBR: 3,\"0123\",129,\"Bob\"\r\nOK\r\n")
            .build();
        let settings = SuiteSettings {
            sim_contact: Some("Alice:+15551234".into()),
            ..SuiteSettings::default()
        };
        let mut suite = suite(mock, settings);

        suite.contacts().await.unwrap();

        let report = suite.report().clone();
        assert!(report.is_success());
        assert_eq!(report.contacts.len(), 2);
        assert_eq!(report.contacts[1].name, "Bob");
        // range, two records, name, number
        assert_eq!(report.passed, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_contacts_link_lost_during_range_query() {
        let mock = Builder::new()
            .write(b"AT+CPIN?\r")
            .read(b"+CPIN: READY\r\nOK\r\n")
            .write(b"AT+CPBS=\"SM\"\r")
            .read(b"OK\r\n")
            .write(b"AT+CPBR=?\r")
            .read(b"+CP")
            .build();
        let mut suite = suite(mock, SuiteSettings::default());

        let start = tokio::time::Instant::now();
        let err = suite.contacts().await.unwrap_err();

        assert!(matches!(err, SuiteError::Modem(ModemError::Disconnected)));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_contacts_invalid_range_stops_quietly() {
        let mock = Builder::new()
            .write(b"AT+CPIN?\r")
            .read(b"OK\r\n")
            .write(b"AT+CPBS=\"SM\"\r")
            .read(b"OK\r\n")
            .write(b"AT+CPBR=?\r")
            .read(b"+CPBR: garbage\r\nOK\r\n")
            .build();
        let mut suite = suite(mock, SuiteSettings::default());

        suite.contacts().await.unwrap();
        assert_eq!(suite.report().failed, 1);
        assert!(suite.report().contacts.is_empty());
    }

    #[tokio::test]
    async fn test_call_skipped_without_number() {
        let mut suite = suite(Builder::new().build(), SuiteSettings::default());

        suite.call().await.unwrap();
        suite.sms().await.unwrap();

        assert_eq!(suite.report().skipped, vec!["call".to_string(), "SMS".to_string()]);
        assert!(suite.ctx.reporter.infos.iter().any(|m| m == "skip call tests"));
    }

    #[tokio::test]
    async fn test_call_asks_operator() {
        let mock = Builder::new()
            .write(b"ATD0123456789;\r")
            .read(b"OK\r\n")
            .write(b"ATH\r")
            .read(b"OK\r\n")
            .build();
        let mut suite = suite(mock, with_number());
        suite.ctx.reporter.answers = vec![true, false];

        suite.call().await.unwrap();

        let (_, ctx) = suite.into_parts();
        let (reporter, report) = ctx.finish();
        assert_eq!(
            reporter.questions,
            vec![
                "number 0123456789 is ringing within ~30 seconds".to_string(),
                "ringing stopped within ~10 seconds".to_string(),
            ]
        );
        assert_eq!((report.passed, report.failed), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sms_gives_up_after_sim_busy() {
        let mut builder = Builder::new();
        for _ in 0..3 {
            builder
                .write(b"AT+CMGF=1\r")
                .read(b"OK\r\n")
                .write(b"AT+CMGS=\"0123456789\"\r")
                .read(b"\r\n+CMS ERROR: 14 SIM busy\r\n");
        }
        let mut suite = suite(builder.build(), with_number());

        let err = suite.sms().await.unwrap_err();
        assert!(matches!(err, SuiteError::Aborted(_)));
        assert_eq!(suite.report().failures, vec!["can't send SMS: SIM busy".to_string()]);
    }

    #[tokio::test]
    async fn test_pdu_sms_sends_pdu() {
        let mock = Builder::new()
            .write(b"AT+CMGF=0\r")
            .read(b"OK\r\n")
            .write(b"AT+CMGS=17\r")
            .read(b"\r\n> ")
            .write(b"0001000A811032547698000005E8329BFD06")
            .write(&[0x1A])
            .read(b"+CMGS: 3\r\nOK\r\n")
            .build();
        let mut suite = suite(mock, with_number());

        suite.pdu_sms().await.unwrap();

        let (_, ctx) = suite.into_parts();
        let (reporter, report) = ctx.finish();
        assert_eq!(reporter.questions, vec!["received SMS with text : 'hello'".to_string()]);
        assert_eq!(report.passed, 1);
    }

    #[tokio::test]
    async fn test_run_stops_when_init_fails() {
        let mock = Builder::new().write(b"AT\r").read(b"ERROR\r\n").build();
        let mut suite = suite(mock, SuiteSettings::default());

        let err = suite.run_all().await.unwrap_err();
        assert!(matches!(err, SuiteError::Modem(ModemError::At(_))));
        assert_eq!(suite.report().failed, 1);
    }

    #[test]
    fn test_section_from_str() {
        assert_eq!("pdu-sms".parse::<Section>().unwrap(), Section::PduSms);
        assert_eq!("Basics".parse::<Section>().unwrap(), Section::Basics);
        assert!("gprs".parse::<Section>().is_err());
    }
}
