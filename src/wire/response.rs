//! Response line framing (spec.md §6): `%tag payload`, `%ok`, and the
//! closed `%error NNN message[: detail]` taxonomy.

use std::fmt;

/// The closed set of wire error codes (spec.md §6). The numeric code and
/// message text are part of the wire format and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    RegistrationDeferred,
    ObjectNotAuthoritative,
    NoObjectsFound,
    NotCompatibleWithVersion,
    InvalidAttribute,
    InvalidAttributeSyntax,
    RequiredAttributeMissing,
    ObjectReferenceNotFound,
    PrimaryKeyNotUnique,
    FailedToUpdateOutdatedObject,
    ExceededMaxObjectsLimit,
    InvalidLimit,
    NothingToTransfer,
    NotMasterForAuthorityArea,
    ObjectNotFound,
    InvalidDirectiveSyntax,
    InvalidAuthorityArea,
    InvalidClass,
    InvalidHostPort,
    InvalidQuerySyntax,
    QueryTooComplex,
    InvalidSecurityMethod,
    AuthenticationFailed,
    EncriptionFailed,
    CorruptDataKeyaddFailed,
    DirectiveNotAvailable,
    NotAuthorizedForDirective,
    UnidentifiedError,
    RegistrationNotAuthorized,
    InvalidDisplayFormat,
    MemoryAllocationProblem,
    ServiceNotAvailable,
    UnrecoverableError,
    IdleTimeExceeded,
    Diagnostic,
}

impl ErrorCode {
    /// The three-digit numeric prefix.
    pub fn code(self) -> u16 {
        use ErrorCode::*;
        match self {
            RegistrationDeferred => 120,
            ObjectNotAuthoritative => 130,
            NoObjectsFound => 230,
            NotCompatibleWithVersion => 300,
            InvalidAttribute => 320,
            InvalidAttributeSyntax => 321,
            RequiredAttributeMissing => 322,
            ObjectReferenceNotFound => 323,
            PrimaryKeyNotUnique => 324,
            FailedToUpdateOutdatedObject => 325,
            ExceededMaxObjectsLimit => 330,
            InvalidLimit => 331,
            NothingToTransfer => 332,
            NotMasterForAuthorityArea => 333,
            ObjectNotFound => 336,
            InvalidDirectiveSyntax => 338,
            InvalidAuthorityArea => 340,
            InvalidClass => 341,
            InvalidHostPort => 342,
            InvalidQuerySyntax => 350,
            QueryTooComplex => 351,
            InvalidSecurityMethod => 352,
            AuthenticationFailed => 353,
            EncriptionFailed => 354,
            CorruptDataKeyaddFailed => 360,
            DirectiveNotAvailable => 400,
            NotAuthorizedForDirective => 401,
            UnidentifiedError => 402,
            RegistrationNotAuthorized => 420,
            InvalidDisplayFormat => 436,
            MemoryAllocationProblem => 500,
            ServiceNotAvailable => 501,
            UnrecoverableError => 502,
            IdleTimeExceeded => 503,
            Diagnostic => 560,
        }
    }

    /// The fixed wire text that follows the numeric code.
    pub fn message(self) -> &'static str {
        use ErrorCode::*;
        match self {
            RegistrationDeferred => "Registration Deferred",
            ObjectNotAuthoritative => "Object not authoritative",
            NoObjectsFound => "No Objects Found",
            NotCompatibleWithVersion => "Not Compatible With Version",
            InvalidAttribute => "Invalid Attribute",
            InvalidAttributeSyntax => "Invalid Attribute Syntax",
            RequiredAttributeMissing => "Required Attribute Missing",
            ObjectReferenceNotFound => "Object Reference Not Found",
            PrimaryKeyNotUnique => "Primary Key Not Unique",
            FailedToUpdateOutdatedObject => "Failed to Update Outdated Object",
            ExceededMaxObjectsLimit => "Exceeded Max Objects Limit",
            InvalidLimit => "Invalid Limit",
            NothingToTransfer => "Nothing To Transfer",
            NotMasterForAuthorityArea => "Not Master for Authority Area",
            ObjectNotFound => "Object Not Found",
            InvalidDirectiveSyntax => "Invalid Directive Syntax",
            InvalidAuthorityArea => "Invalid Authority Area",
            InvalidClass => "Invalid Class",
            InvalidHostPort => "Invalid Host/Port",
            InvalidQuerySyntax => "Invalid Query Syntax",
            QueryTooComplex => "Query Too Complex",
            InvalidSecurityMethod => "Invalid Security Method",
            AuthenticationFailed => "Authentication Failed",
            EncriptionFailed => "Encription Failed",
            CorruptDataKeyaddFailed => "Corrupt Data. Keyadd Failed",
            DirectiveNotAvailable => "Directive Not Available",
            NotAuthorizedForDirective => "Not Authorized for Directive",
            UnidentifiedError => "Unidentified Error",
            RegistrationNotAuthorized => "Registration Not Authorized",
            InvalidDisplayFormat => "Invalid Display Format",
            MemoryAllocationProblem => "Memory Allocation Problem",
            ServiceNotAvailable => "Service Not Available",
            UnrecoverableError => "Unrecoverable Error",
            IdleTimeExceeded => "Idle Time Exceeded",
            Diagnostic => "<diagnostic>",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.message())
    }
}

/// One line written back to the client.
#[derive(Debug, Clone)]
pub enum ResponseLine {
    /// `%tag payload`, e.g. `%referral rwhois://...` or a bare data line
    /// (empty tag) carrying a `Class:Attr:Value` record field.
    Tagged { tag: String, payload: String },
    /// Terminal success.
    Ok,
    /// Terminal error, with an optional free-text detail appended after a
    /// colon (spec.md §6: `%error NNN message[: detail]`).
    Error { code: ErrorCode, detail: Option<String> },
}

impl ResponseLine {
    pub fn tagged(tag: impl Into<String>, payload: impl Into<String>) -> Self {
        ResponseLine::Tagged { tag: tag.into(), payload: payload.into() }
    }

    /// A bare data line (record field), with no `%tag` prefix.
    pub fn data(line: impl Into<String>) -> Self {
        ResponseLine::Tagged { tag: String::new(), payload: line.into() }
    }

    pub fn error(code: ErrorCode) -> Self {
        ResponseLine::Error { code, detail: None }
    }

    pub fn error_detail(code: ErrorCode, detail: impl Into<String>) -> Self {
        ResponseLine::Error { code, detail: Some(detail.into()) }
    }

    /// Renders the line as it is written to the wire, without a trailing
    /// newline (the session loop appends `\n`).
    pub fn render(&self) -> String {
        match self {
            ResponseLine::Tagged { tag, payload } if tag.is_empty() => payload.clone(),
            ResponseLine::Tagged { tag, payload } => format!("%{tag} {payload}"),
            ResponseLine::Ok => "%ok".to_string(),
            ResponseLine::Error { code, detail: None } => format!("%error {code}"),
            ResponseLine::Error { code, detail: Some(detail) } => {
                format!("%error {code}: {detail}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_ok_line() {
        assert_eq!(ResponseLine::Ok.render(), "%ok");
    }

    #[test]
    fn renders_error_line_without_detail() {
        let line = ResponseLine::error(ErrorCode::DirectiveNotAvailable);
        assert_eq!(line.render(), "%error 400 Directive Not Available");
    }

    #[test]
    fn renders_error_line_with_detail() {
        let line = ResponseLine::error_detail(ErrorCode::InvalidQuerySyntax, "unexpected token");
        assert_eq!(line.render(), "%error 350 Invalid Query Syntax: unexpected token");
    }

    #[test]
    fn renders_tagged_line() {
        let line = ResponseLine::tagged("referral", "rwhois://other.example:4321/auth-area=sub.biz.");
        assert_eq!(line.render(), "%referral rwhois://other.example:4321/auth-area=sub.biz.");
    }

    #[test]
    fn data_line_has_no_percent_prefix() {
        let line = ResponseLine::data("domain:Domain-Name:example.com");
        assert_eq!(line.render(), "domain:Domain-Name:example.com");
    }
}
