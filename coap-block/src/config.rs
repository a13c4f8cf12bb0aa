// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The libcoap-rs Contributors, all rights reserved.
 * This file is part of the libcoap-rs project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * config.rs - Session configuration.
 */

//! Configuration of block-wise transfers and transmission parameters.

use std::ops::{BitOr, BitOrAssign};

use crate::{
    error::ConfigError,
    types::{CoapFixedPoint, MaxRetransmit},
};

/// Default MTU of a session.
pub const COAP_DEFAULT_MTU: usize = 1152;
/// Default maximum message size of reliable transports if the peer did not send a CSM.
pub const COAP_DEFAULT_MAX_MESSAGE_SIZE: usize = 1152;
pub const COAP_DEFAULT_NSTART: usize = 1;
pub const COAP_DEFAULT_ACK_TIMEOUT: CoapFixedPoint = CoapFixedPoint::new(2, 0);
pub const COAP_DEFAULT_ACK_RANDOM_FACTOR: CoapFixedPoint = CoapFixedPoint::new(1, 500);
pub const COAP_DEFAULT_MAX_RETRANSMIT: MaxRetransmit = 4;
pub const COAP_DEFAULT_OBS_MAX_NON: u32 = 5;
pub const COAP_DEFAULT_OBS_MAX_FAIL: u32 = 3;
/// Largest supported value of MAX_RETRANSMIT.
pub const COAP_MAX_MAX_RETRANSMIT: MaxRetransmit = 15;
/// Smallest MTU that still leaves room for a block of 16 bytes.
pub const COAP_MIN_MTU: usize = 64;

/// Flags selecting how block-wise transfers are handled.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct CoapBlockMode(u8);

impl CoapBlockMode {
    /// Let the engine handle block-wise transfers. Without it, messages pass through unchanged.
    pub const USE_LIBCOAP: CoapBlockMode = CoapBlockMode(0x01);
    /// Reassemble received bodies before handing them to the application.
    pub const SINGLE_BODY: CoapBlockMode = CoapBlockMode(0x02);

    pub const fn empty() -> CoapBlockMode {
        CoapBlockMode(0)
    }

    pub const fn contains(&self, other: CoapBlockMode) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn bits(&self) -> u8 {
        self.0
    }
}

impl Default for CoapBlockMode {
    fn default() -> Self {
        CoapBlockMode::USE_LIBCOAP | CoapBlockMode::SINGLE_BODY
    }
}

impl BitOr for CoapBlockMode {
    type Output = CoapBlockMode;

    fn bitor(self, rhs: Self) -> Self::Output {
        CoapBlockMode(self.0 | rhs.0)
    }
}

impl BitOrAssign for CoapBlockMode {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Configuration a [CoapSession](crate::CoapSession) is created with.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CoapSessionConfig {
    block_mode: CoapBlockMode,
    mtu: usize,
    max_body_size: usize,
    nstart: usize,
    ack_timeout: CoapFixedPoint,
    ack_random_factor: CoapFixedPoint,
    max_retransmit: MaxRetransmit,
    obs_max_non: u32,
    obs_max_fail: u32,
    bert: bool,
    csm_max_message_size: usize,
}

impl Default for CoapSessionConfig {
    fn default() -> Self {
        CoapSessionConfig {
            block_mode: CoapBlockMode::default(),
            mtu: COAP_DEFAULT_MTU,
            max_body_size: 0,
            nstart: COAP_DEFAULT_NSTART,
            ack_timeout: COAP_DEFAULT_ACK_TIMEOUT,
            ack_random_factor: COAP_DEFAULT_ACK_RANDOM_FACTOR,
            max_retransmit: COAP_DEFAULT_MAX_RETRANSMIT,
            obs_max_non: COAP_DEFAULT_OBS_MAX_NON,
            obs_max_fail: COAP_DEFAULT_OBS_MAX_FAIL,
            bert: false,
            csm_max_message_size: COAP_DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl CoapSessionConfig {
    pub fn new() -> CoapSessionConfig {
        CoapSessionConfig::default()
    }

    pub fn block_mode(&self) -> CoapBlockMode {
        self.block_mode
    }

    pub fn with_block_mode(mut self, block_mode: CoapBlockMode) -> CoapSessionConfig {
        self.block_mode = block_mode;
        self
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }

    pub fn with_mtu(mut self, mtu: usize) -> Result<CoapSessionConfig, ConfigError> {
        if mtu < COAP_MIN_MTU {
            return Err(ConfigError::MtuTooSmall(mtu));
        }
        self.mtu = mtu;
        Ok(self)
    }

    /// Maximum size of a reassembled request body, 0 meaning unlimited.
    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> CoapSessionConfig {
        self.max_body_size = max_body_size;
        self
    }

    pub fn nstart(&self) -> usize {
        self.nstart
    }

    pub fn with_nstart(mut self, nstart: usize) -> Result<CoapSessionConfig, ConfigError> {
        if nstart == 0 {
            return Err(ConfigError::InvalidNstart);
        }
        self.nstart = nstart;
        Ok(self)
    }

    pub fn ack_timeout(&self) -> CoapFixedPoint {
        self.ack_timeout
    }

    pub fn with_ack_timeout<T: Into<CoapFixedPoint>>(
        mut self,
        ack_timeout: T,
    ) -> Result<CoapSessionConfig, ConfigError> {
        let ack_timeout = ack_timeout.into();
        if ack_timeout.fractional_part >= 1000 {
            return Err(ConfigError::InvalidFractionalPart);
        }
        self.ack_timeout = ack_timeout;
        Ok(self)
    }

    pub fn ack_random_factor(&self) -> CoapFixedPoint {
        self.ack_random_factor
    }

    pub fn with_ack_random_factor<T: Into<CoapFixedPoint>>(
        mut self,
        ack_random_factor: T,
    ) -> Result<CoapSessionConfig, ConfigError> {
        let ack_random_factor = ack_random_factor.into();
        if ack_random_factor.fractional_part >= 1000 {
            return Err(ConfigError::InvalidFractionalPart);
        }
        if ack_random_factor.integer_part < 1 {
            return Err(ConfigError::InvalidAckRandomFactor);
        }
        self.ack_random_factor = ack_random_factor;
        Ok(self)
    }

    pub fn max_retransmit(&self) -> MaxRetransmit {
        self.max_retransmit
    }

    pub fn with_max_retransmit(mut self, max_retransmit: MaxRetransmit) -> Result<CoapSessionConfig, ConfigError> {
        if max_retransmit > COAP_MAX_MAX_RETRANSMIT {
            return Err(ConfigError::MaxRetransmitTooLarge(max_retransmit));
        }
        self.max_retransmit = max_retransmit;
        Ok(self)
    }

    /// Number of non-confirmable notifications sent before a confirmable one.
    ///
    /// The engine only stores this value. Resource registries that keep observer lists read it
    /// to decide when a notification has to be confirmable.
    pub fn obs_max_non(&self) -> u32 {
        self.obs_max_non
    }

    pub fn with_obs_max_non(mut self, obs_max_non: u32) -> Result<CoapSessionConfig, ConfigError> {
        if obs_max_non > u8::MAX as u32 {
            return Err(ConfigError::ObserveLimitTooLarge(obs_max_non));
        }
        self.obs_max_non = obs_max_non;
        Ok(self)
    }

    /// Number of failed confirmable notifications before an observer is removed.
    ///
    /// Like [CoapSessionConfig::obs_max_non()], this is read by resource registries, not by the
    /// engine itself.
    pub fn obs_max_fail(&self) -> u32 {
        self.obs_max_fail
    }

    pub fn with_obs_max_fail(mut self, obs_max_fail: u32) -> Result<CoapSessionConfig, ConfigError> {
        if obs_max_fail > u8::MAX as u32 {
            return Err(ConfigError::ObserveLimitTooLarge(obs_max_fail));
        }
        self.obs_max_fail = obs_max_fail;
        Ok(self)
    }

    /// Whether this endpoint supports BERT (advertised in its CSM).
    pub fn bert(&self) -> bool {
        self.bert
    }

    pub fn with_bert(mut self, bert: bool) -> CoapSessionConfig {
        self.bert = bert;
        self
    }

    /// Maximum message size advertised in this endpoint's CSM.
    pub fn csm_max_message_size(&self) -> usize {
        self.csm_max_message_size
    }

    pub fn with_csm_max_message_size(mut self, size: usize) -> Result<CoapSessionConfig, ConfigError> {
        if size < COAP_MIN_MTU {
            return Err(ConfigError::MtuTooSmall(size));
        }
        self.csm_max_message_size = size;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CoapSessionConfig::default();
        assert!(config.block_mode().contains(CoapBlockMode::USE_LIBCOAP));
        assert!(config.block_mode().contains(CoapBlockMode::SINGLE_BODY));
        assert_eq!(config.mtu(), 1152);
        assert_eq!(config.nstart(), 1);
        assert_eq!(config.ack_timeout().as_millis(), 2000);
        assert_eq!(config.ack_random_factor().as_millis(), 1500);
        assert_eq!(config.max_retransmit(), 4);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let config = CoapSessionConfig::default();
        assert_eq!(config.with_nstart(0), Err(ConfigError::InvalidNstart));
        assert_eq!(config.with_mtu(10), Err(ConfigError::MtuTooSmall(10)));
        assert_eq!(
            config.with_ack_random_factor((0, 900)),
            Err(ConfigError::InvalidAckRandomFactor)
        );
        assert_eq!(config.with_ack_timeout((1, 1000)), Err(ConfigError::InvalidFractionalPart));
        assert_eq!(config.with_max_retransmit(16), Err(ConfigError::MaxRetransmitTooLarge(16)));
        assert_eq!(config.with_obs_max_non(256), Err(ConfigError::ObserveLimitTooLarge(256)));
        assert_eq!(config.with_obs_max_fail(255).map(|c| c.obs_max_fail()), Ok(255));
    }
}
