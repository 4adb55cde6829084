//! # FT8 Forward-Error-Correction Core
//!
//! This crate provides the error-correction heart of an FT8 weak-signal
//! receiver: soft-decision decoding of the FT8 (174, 91) Low-Density
//! Parity-Check code, the FT8 CRC-14, and the GF(2) matrix inversion used
//! by ordered-statistics recovery paths.
//!
//! ## Overview
//!
//! FT8 transmits a 77-bit payload protected by a 14-bit CRC and an LDPC
//! code with 83 parity checks over a 174-bit codeword, of which the first
//! 91 bits are the systematic prefix. An upstream demodulator turns tone
//! energies into one log-likelihood ratio per codeword bit; this crate
//! turns those 174 LLRs back into bits:
//!
//! - **Sum-product decoding** over the code's fixed Tanner graph, in either
//!   the probability or the log-likelihood domain, with early termination
//!   and a best-effort fallback when the iteration budget runs out
//! - **Parity scoring** of hard-decision words (83 = valid codeword)
//! - **CRC-14** computation and end-to-end payload validation
//! - **Systematic encoding** for loopback tests and frame synthesis
//! - **Binary Gauss-Jordan inversion** for callers that attempt
//!   matrix-inversion decoding on the most reliable 91 bits
//!
//! ## Signal Flow
//!
//! ```text
//! RX: tones → LLR[174] → LdpcDecoder → hard[174] ─┬→ checks_passed == 83?
//!                                                 └→ check_crc(hard[0..91])
//! ```
//!
//! Everything here is single-threaded, synchronous and allocation-light:
//! decoders reuse their own scratch, nothing blocks, and decode failure is
//! data (`checks_passed < 83` in the result), not an error path.
//!
//! ## Example
//!
//! ```rust
//! use ft8fec_core::prelude::*;
//!
//! // Encode a message (here: all zeros) and receive it without noise.
//! let codeword = LdpcEncoder::new().encode(&[0u8; LDPC_K]);
//! let llrs: Vec<f32> = codeword.iter().map(|&b| if b == 0 { 10.0 } else { -10.0 }).collect();
//! let llrs: [f32; LDPC_N] = llrs.try_into().unwrap();
//!
//! let mut decoder = LdpcDecoder::new(MessageDomain::LogLikelihood, 30);
//! let result = decoder.decode(&llrs);
//! assert!(result.converged);
//!
//! // End-to-end verdict on the systematic prefix.
//! let mut prefix = [0u8; LDPC_K];
//! prefix.copy_from_slice(&result.hard_decision[..LDPC_K]);
//! assert!(check_crc(&prefix));
//! ```

pub mod crc14;
pub mod gf2_matrix;
pub mod ldpc_decoder;
pub mod ldpc_encoder;
pub mod ldpc_tables;

/// Commonly used items, re-exported for convenience.
pub mod prelude {
    pub use crate::crc14::{check_crc, crc14};
    pub use crate::gf2_matrix::{gauss_jordan, GJ_COLS, GJ_ROWS};
    pub use crate::ldpc_decoder::{
        fast_tanh, hard_decide, ldpc_check, DecoderConfig, LdpcDecodeResult, LdpcDecoder,
        MessageDomain,
    };
    pub use crate::ldpc_encoder::LdpcEncoder;
    pub use crate::ldpc_tables::{LDPC_K, LDPC_M, LDPC_N};
}
