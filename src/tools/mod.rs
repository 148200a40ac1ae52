//! Guarded Command Execution
//!
//! This module decides whether an untrusted command request may run, runs it
//! with bounded resource exposure, and reports one structured result.
//!
//! # Security Features
//!
//! - **Allowlist**: Only configured base commands may run (exact match)
//! - **No Shell**: Commands are executed as argument vectors, never through a shell
//! - **Operator Scan**: Requests containing `;`, `&&`, `||`, `|`, `>`, `>>`, `<`, `<<` are refused
//! - **Directory Checks**: The working directory must exist and be readable, writable and searchable
//! - **Timeout Enforcement**: Overrunning processes are killed together with their process group
//!
//! # Architecture
//!
//! The module is organized into:
//! - `validator.rs`: Allowlist and shell-operator checks
//! - `directory.rs`: Working directory checks
//! - `executor.rs`: Subprocess execution and result normalization
//! - `timeout.rs`: Timeout bounds
//! - `gateway.rs`: Orchestration of the above into one result per request
//!
//! # Example
//!
//! ```no_run
//! use shell_gateway::tools::{AllowList, CommandRequest, ExecutionGateway};
//!
//! #[tokio::main]
//! async fn main() {
//!     let gateway = ExecutionGateway::new(AllowList::parse("ls,cat,pwd"));
//!
//!     let request = CommandRequest::new(["ls", "-la"], "/tmp").with_timeout(5);
//!     let result = gateway.handle(&request).await;
//!
//!     match result.error() {
//!         Some(error) => eprintln!("Failed: {}", error),
//!         None => println!("{}", result.stdout()),
//!     }
//! }
//! ```

mod directory;
mod executor;
mod gateway;
mod timeout;
mod validator;

pub use directory::DirectoryManager;
pub use executor::{
    CommandExecutor, CommandRunner, ExecutionRecord, ExecutionResult, FailureKind, FAILURE_STATUS,
};
pub use gateway::{CommandRequest, ExecutionGateway};
pub use timeout::{Elapsed, ExecutionTimeout};
pub use validator::{AllowList, CommandValidator, Rejection, ShellOperator, ValidationOutcome};
