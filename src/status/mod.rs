//! Operation Status Module
//!
//! This module defines [`Status`], the result taxonomy carried through the
//! whole read pipeline, and [`Submission`], the tagged outcome of an
//! asynchronous I/O submission.
//!
//! ## Design Overview
//!
//! Every fallible pipeline operation either returns `Result<T, Status>`
//! (synchronous entry points) or delivers a `Status` to a completion
//! callback (asynchronous entry points). A `Status` is a small value type:
//! a [`Code`], an optional [`SubCode`] refinement, an optional
//! human-readable message, and an `asynchronous` flag recording whether the
//! status was produced on a completion path rather than inline.
//!
//! Two `(code, subcode)` pairings are canonical and only constructible
//! through their dedicated constructors:
//!
//! - *no space* is always `(IoError, NoSpace)` — see [`Status::no_space`].
//! - *memory limit* is always `(Aborted, MemoryLimit)` — see
//!   [`Status::memory_limit`].
//!
//! `IoPending` is reserved for the asynchronous submission protocol and is
//! never surfaced by a synchronous entry point.
//!
//! # Concurrency model
//!
//! A `Status` is a plain value: cloning and reading are safe anywhere, and a
//! status moved across threads inside a completion callback carries no
//! shared state. Mutation (e.g. [`Status::into_async`]) consumes the value,
//! so no external synchronization is ever required.

#[cfg(test)]
mod tests;

use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// Codes
// ------------------------------------------------------------------------------------------------

/// Primary classification of an operation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Code {
    /// The operation succeeded.
    #[default]
    Ok,
    /// The requested entity does not exist (internally: a cache miss).
    NotFound,
    /// On-disk or in-flight data failed validation.
    Corruption,
    /// The operation is not implemented or not compiled in.
    NotSupported,
    /// A caller-supplied argument was rejected.
    InvalidArgument,
    /// The underlying file or device reported a failure.
    IoError,
    /// A merge is already in progress for the target key.
    MergeInProgress,
    /// The operation produced a partial result.
    Incomplete,
    /// The system is shutting down.
    ShutdownInProgress,
    /// The operation exceeded its deadline.
    TimedOut,
    /// The operation was aborted.
    Aborted,
    /// A required resource is temporarily busy.
    Busy,
    /// The requested entity has expired.
    Expired,
    /// The operation failed but may succeed if re-attempted.
    TryAgain,
    /// The submission was accepted and will complete via callback.
    IoPending,
}

/// Secondary refinement of a [`Code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubCode {
    /// No refinement.
    #[default]
    None,
    /// A mutex acquisition timed out.
    MutexTimeout,
    /// A lock acquisition timed out.
    LockTimeout,
    /// The lock table is full.
    LockLimit,
    /// The device is out of space.
    NoSpace,
    /// A deadlock was detected.
    Deadlock,
    /// A file was replaced underneath the reader.
    StaleFile,
    /// A configured memory budget was exceeded.
    MemoryLimit,
    /// Reserved for the async framework's completion bookkeeping; never
    /// produced by this crate.
    OnComplete,
}

impl Code {
    /// Short display name, matching the conventional rendering.
    fn as_str(self) -> &'static str {
        match self {
            Code::Ok => "OK",
            Code::NotFound => "NotFound",
            Code::Corruption => "Corruption",
            Code::NotSupported => "Not implemented",
            Code::InvalidArgument => "Invalid argument",
            Code::IoError => "IO error",
            Code::MergeInProgress => "Merge in progress",
            Code::Incomplete => "Result incomplete",
            Code::ShutdownInProgress => "Shutdown in progress",
            Code::TimedOut => "Operation timed out",
            Code::Aborted => "Operation aborted",
            Code::Busy => "Resource busy",
            Code::Expired => "Operation expired",
            Code::TryAgain => "Operation failed. Try again.",
            Code::IoPending => "IO pending",
        }
    }
}

impl SubCode {
    fn as_str(self) -> &'static str {
        match self {
            SubCode::None => "",
            SubCode::MutexTimeout => "Timeout Acquiring Mutex",
            SubCode::LockTimeout => "Timeout waiting to lock key",
            SubCode::LockLimit => "Failed to acquire lock due to max_num_locks limit",
            SubCode::NoSpace => "No space left on device",
            SubCode::Deadlock => "Deadlock",
            SubCode::StaleFile => "Stale file handle",
            SubCode::MemoryLimit => "Memory limit reached",
            SubCode::OnComplete => "Operation will complete asynchronously",
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Status
// ------------------------------------------------------------------------------------------------

/// Outcome of a pipeline operation.
///
/// See the [module-level documentation](self) for the taxonomy and the
/// canonical `(code, subcode)` pairings.
#[derive(Debug, Clone, Default, Error)]
#[error("{}", render(.code, .subcode, .state))]
pub struct Status {
    code: Code,
    subcode: SubCode,
    state: Option<String>,
    asynchronous: bool,
}

/// Format a status the way `Status::to_string()` renders it: the code name,
/// then the subcode name, then the free-form message, colon-separated.
fn render(code: &Code, subcode: &SubCode, state: &Option<String>) -> String {
    let mut out = String::from(code.as_str());
    if *subcode != SubCode::None {
        out.push_str(": ");
        out.push_str(subcode.as_str());
    }
    if let Some(msg) = state {
        out.push_str(": ");
        out.push_str(msg);
    }
    out
}

impl Status {
    fn new(code: Code, subcode: SubCode, state: Option<String>) -> Self {
        Status {
            code,
            subcode,
            state,
            asynchronous: false,
        }
    }

    /// Success.
    pub fn ok() -> Self {
        Status::default()
    }

    /// The requested entity does not exist.
    pub fn not_found() -> Self {
        Status::new(Code::NotFound, SubCode::None, None)
    }

    /// The requested entity does not exist, with a message.
    pub fn not_found_msg(msg: impl Into<String>) -> Self {
        Status::new(Code::NotFound, SubCode::None, Some(msg.into()))
    }

    /// Data failed validation.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Status::new(Code::Corruption, SubCode::None, Some(msg.into()))
    }

    /// The operation is not implemented or not compiled in.
    pub fn not_supported(msg: impl Into<String>) -> Self {
        Status::new(Code::NotSupported, SubCode::None, Some(msg.into()))
    }

    /// A caller-supplied argument was rejected.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Status::new(Code::InvalidArgument, SubCode::None, Some(msg.into()))
    }

    /// The underlying file or device reported a failure.
    pub fn io_error(msg: impl Into<String>) -> Self {
        Status::new(Code::IoError, SubCode::None, Some(msg.into()))
    }

    /// An I/O failure with a refining subcode (e.g. [`SubCode::StaleFile`]).
    pub fn io_error_sub(subcode: SubCode, msg: impl Into<String>) -> Self {
        Status::new(Code::IoError, subcode, Some(msg.into()))
    }

    /// A merge is already in progress for the target key.
    pub fn merge_in_progress() -> Self {
        Status::new(Code::MergeInProgress, SubCode::None, None)
    }

    /// The system is shutting down.
    pub fn shutdown_in_progress() -> Self {
        Status::new(Code::ShutdownInProgress, SubCode::None, None)
    }

    /// A required resource is temporarily busy.
    pub fn busy() -> Self {
        Status::new(Code::Busy, SubCode::None, None)
    }

    /// The requested entity has expired.
    pub fn expired() -> Self {
        Status::new(Code::Expired, SubCode::None, None)
    }

    /// The operation failed but may succeed if re-attempted.
    pub fn try_again() -> Self {
        Status::new(Code::TryAgain, SubCode::None, None)
    }

    /// The operation exceeded its deadline.
    pub fn timed_out() -> Self {
        Status::new(Code::TimedOut, SubCode::None, None)
    }

    /// The operation was aborted.
    pub fn aborted(msg: impl Into<String>) -> Self {
        Status::new(Code::Aborted, SubCode::None, Some(msg.into()))
    }

    /// The operation produced a partial result.
    pub fn incomplete(msg: impl Into<String>) -> Self {
        Status::new(Code::Incomplete, SubCode::None, Some(msg.into()))
    }

    /// The device is out of space. Always `(IoError, NoSpace)`.
    pub fn no_space() -> Self {
        Status::new(Code::IoError, SubCode::NoSpace, None)
    }

    /// A memory budget was exceeded. Always `(Aborted, MemoryLimit)`.
    pub fn memory_limit() -> Self {
        Status::new(Code::Aborted, SubCode::MemoryLimit, None)
    }

    /// The submission was accepted; completion arrives via callback.
    pub fn io_pending() -> Self {
        Status::new(Code::IoPending, SubCode::None, None)
    }

    /// Primary code.
    pub fn code(&self) -> Code {
        self.code
    }

    /// Secondary refinement.
    pub fn subcode(&self) -> SubCode {
        self.subcode
    }

    /// Free-form message, if any.
    pub fn message(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// Whether this status was produced on a completion path rather than
    /// returned inline.
    pub fn is_async(&self) -> bool {
        self.asynchronous
    }

    /// Tag this status as having been produced on a completion path.
    pub fn into_async(mut self) -> Self {
        self.asynchronous = true;
        self
    }

    /// Returns `true` iff the status indicates success.
    pub fn is_ok(&self) -> bool {
        self.code == Code::Ok
    }

    /// Returns `true` iff the status indicates a NotFound error.
    pub fn is_not_found(&self) -> bool {
        self.code == Code::NotFound
    }

    /// Returns `true` iff the status indicates a Corruption error.
    pub fn is_corruption(&self) -> bool {
        self.code == Code::Corruption
    }

    /// Returns `true` iff the status indicates a NotSupported error.
    pub fn is_not_supported(&self) -> bool {
        self.code == Code::NotSupported
    }

    /// Returns `true` iff the status indicates an InvalidArgument error.
    pub fn is_invalid_argument(&self) -> bool {
        self.code == Code::InvalidArgument
    }

    /// Returns `true` iff the status indicates an I/O error.
    pub fn is_io_error(&self) -> bool {
        self.code == Code::IoError
    }

    /// Returns `true` iff the status indicates an incomplete result.
    pub fn is_incomplete(&self) -> bool {
        self.code == Code::Incomplete
    }

    /// Returns `true` iff the status indicates a timed-out operation.
    pub fn is_timed_out(&self) -> bool {
        self.code == Code::TimedOut
    }

    /// Returns `true` iff the status indicates an aborted operation.
    pub fn is_aborted(&self) -> bool {
        self.code == Code::Aborted
    }

    /// Returns `true` iff the status indicates a merge in progress.
    pub fn is_merge_in_progress(&self) -> bool {
        self.code == Code::MergeInProgress
    }

    /// Returns `true` iff the status indicates a shutdown in progress.
    pub fn is_shutdown_in_progress(&self) -> bool {
        self.code == Code::ShutdownInProgress
    }

    /// Returns `true` iff the status indicates a busy resource.
    pub fn is_busy(&self) -> bool {
        self.code == Code::Busy
    }

    /// Returns `true` iff the status indicates an expired operation.
    pub fn is_expired(&self) -> bool {
        self.code == Code::Expired
    }

    /// Returns `true` iff the operation failed but may succeed when
    /// re-attempted.
    pub fn is_try_again(&self) -> bool {
        self.code == Code::TryAgain
    }

    /// Returns `true` iff the submission is pending an async completion.
    pub fn is_io_pending(&self) -> bool {
        self.code == Code::IoPending
    }

    /// Returns `true` iff the status is the canonical out-of-space error.
    pub fn is_no_space(&self) -> bool {
        self.code == Code::IoError && self.subcode == SubCode::NoSpace
    }

    /// Returns `true` iff the status is the canonical memory-limit error.
    pub fn is_memory_limit(&self) -> bool {
        self.code == Code::Aborted && self.subcode == SubCode::MemoryLimit
    }

    /// Convert into a `Result`, mapping success to `Ok(())` and any error
    /// code to `Err(self)`.
    pub fn into_result(self) -> Result<(), Status> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<std::io::Error> for Status {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => Status::timed_out(),
            _ => Status::io_error(err.to_string()),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Submission
// ------------------------------------------------------------------------------------------------

/// Outcome of submitting work to an asynchronous interface.
///
/// `Pending` transfers ownership of the in-flight request state (the boxed
/// completion callback) to the receiver, which must invoke it exactly once;
/// the eventual status carries `is_async() == true`. `Inline` means the
/// work completed on the submitting thread and the callback was dropped
/// without being invoked; the carried status has `is_async() == false`.
#[derive(Debug)]
pub enum Submission<T> {
    /// Completed on the submitting thread; payload delivered here.
    Inline(Status, T),
    /// Deferred; the completion callback owns the rest of the work.
    Pending,
}

impl<T> Submission<T> {
    /// Returns `true` for the deferred arm.
    pub fn is_pending(&self) -> bool {
        matches!(self, Submission::Pending)
    }

    /// Map the inline payload, leaving `Pending` untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Submission<U> {
        match self {
            Submission::Inline(status, value) => Submission::Inline(status, f(value)),
            Submission::Pending => Submission::Pending,
        }
    }
}
