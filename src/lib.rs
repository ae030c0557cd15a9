//! `curve-engine` is a parallel compute engine for pairing-friendly curves.
//!
//! It performs finite-field arithmetic, elliptic-curve group operations,
//! pairings, polynomial transforms and multi-scalar multiplication over
//! large vectors, at the scale needed by zk-SNARK provers.
//!
//! The arithmetic itself lives in a [`Kernel`]: a fixed, versioned table of
//! functions over raw buffers in a linear memory. An [`Engine`] owns a pool
//! of workers, each with a private kernel instance and arena, plus one
//! synchronous instance for single-value operations. On top of that it
//! exposes
//!
//! - field objects [`Engine::fr`], [`Engine::f1`], [`Engine::f2`],
//!   [`Engine::f6`] and [`Engine::f12`] (also [`Engine::gt`]),
//! - curve objects [`Engine::g1`] and [`Engine::g2`],
//! - FFTs over field elements and curve points,
//! - multi-scalar multiplication, and
//! - pairings, including a batched [`Engine::pairing_eq`].
//!
//! Values are opaque byte buffers: field [`Element`]s are kept in
//! Montgomery form and curve [`Point`]s carry their coordinate system.
//!
//! # Example
//!
//! ```
//! use curve_engine::{CurveId, Engine, EngineConfig};
//!
//! let engine = Engine::new(CurveId::Bn128, EngineConfig::default().with_workers(2)).unwrap();
//! let g1 = engine.g1();
//!
//! let one = g1.one().unwrap();
//! let two = g1.add(&one, &one).unwrap();
//! assert!(g1.eq(&two, &g1.double(&one).unwrap()).unwrap());
//! ```

use std::error::Error as StdError;
use std::fmt;
use std::io;

pub mod arena;
mod config;
pub mod curves;
mod domain;
mod engine;
mod field;
mod group;
pub mod kernel;
pub mod multicore;
mod multiexp;
mod pairing;
pub mod task;

pub use self::config::EngineConfig;
pub use self::curves::{Bls12381, Bn128, CurveId, CurveParams, PairingCurve};
pub use self::engine::{Engine, SyncOp};
pub use self::field::{Element, Field};
pub use self::group::{Coordinates, Curve, Point};
pub use self::kernel::{Kernel, KernelImage, Trap, KERNEL_VERSION};

/// This is an error that could occur during any engine operation.
#[derive(Debug)]
pub enum Error {
    /// A buffer does not have the width the operation requires.
    InvalidLength { expected: usize, actual: usize },
    /// Division by zero or inversion of zero.
    DivisionByZero,
    /// A transform length is not a power of two.
    NotPowerOfTwo,
    /// A transform is larger than the root-of-unity table supports.
    DomainTooLarge,
    /// Point and scalar arrays do not line up.
    LengthMismatch,
    /// A serialized value is not canonical or not on the curve.
    InvalidEncoding,
    /// The operation is not available for this field or curve.
    Unsupported,
    /// A synchronous section was started inside another one.
    NestedSyncOp,
    /// An arena would exceed its cap.
    OutOfMemory,
    /// A task referred to a buffer it never allocated.
    Task(String),
    /// The kernel rejected a call.
    Kernel(Trap),
    /// A worker stopped before replying.
    WorkerLost,
    /// The kernel implements a different function contract version.
    IncompatibleKernel,
    /// During thread start-up, an I/O error occurred.
    IoError(io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::IoError(e)
    }
}

impl From<Trap> for Error {
    fn from(t: Trap) -> Error {
        Error::Kernel(t)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            Error::Kernel(ref t) => Some(t),
            Error::IoError(ref e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> std::result::Result<(), fmt::Error> {
        match *self {
            Error::InvalidLength { expected, actual } => write!(
                f,
                "buffer has {} bytes but {} were expected",
                actual, expected
            ),
            Error::DivisionByZero => write!(f, "division by zero"),
            Error::NotPowerOfTwo => write!(f, "transform length is not a power of two"),
            Error::DomainTooLarge => write!(f, "transform exceeds the root-of-unity table"),
            Error::LengthMismatch => write!(f, "points and scalars do not line up"),
            Error::InvalidEncoding => write!(f, "encoding is not a valid element or point"),
            Error::Unsupported => write!(f, "operation is not supported here"),
            Error::NestedSyncOp => write!(f, "synchronous operations cannot be nested"),
            Error::OutOfMemory => write!(f, "arena is full"),
            Error::Task(ref msg) => write!(f, "malformed task: {}", msg),
            Error::Kernel(ref t) => write!(f, "kernel trap: {}", t),
            Error::WorkerLost => write!(f, "worker stopped before replying"),
            Error::IncompatibleKernel => write!(f, "kernel version is not supported"),
            Error::IoError(ref e) => write!(f, "I/O error: {}", e),
        }
    }
}
