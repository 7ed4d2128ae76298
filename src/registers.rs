// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The holding register map shared by both roles.

use crate::{
    Address, ExceptionCode, Quantity, Request, Response, Word, CONTROL_REGISTER,
    TEMPERATURE_REGISTER,
};

/// Maximum number of registers in a single read request.
const MAX_READ_QUANTITY: Quantity = 125;

/// Maximum number of registers in a single write request.
const MAX_WRITE_QUANTITY: usize = 123;

/// Exactly two holding registers, addressed `0` and `1`.
///
/// The temperature is written by the server on every read request, the
/// control flag by the client through write requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterMap {
    temperature: Word,
    control: Word,
}

impl RegisterMap {
    /// Number of addressable registers.
    pub const LEN: Quantity = 2;

    /// Both registers start at `0`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            temperature: 0,
            control: 0,
        }
    }

    #[must_use]
    pub const fn temperature(&self) -> Word {
        self.temperature
    }

    #[must_use]
    pub const fn control(&self) -> Word {
        self.control
    }

    pub fn set_temperature(&mut self, value: Word) {
        self.temperature = value;
    }

    /// Read a single register, `None` if the address is not mapped.
    #[must_use]
    pub const fn get(&self, addr: Address) -> Option<Word> {
        match addr {
            TEMPERATURE_REGISTER => Some(self.temperature),
            CONTROL_REGISTER => Some(self.control),
            _ => None,
        }
    }

    fn get_mut(&mut self, addr: Address) -> Option<&mut Word> {
        match addr {
            TEMPERATURE_REGISTER => Some(&mut self.temperature),
            CONTROL_REGISTER => Some(&mut self.control),
            _ => None,
        }
    }

    /// Write a single register.
    pub fn set(&mut self, addr: Address, value: Word) -> Result<(), ExceptionCode> {
        let register = self.get_mut(addr).ok_or(ExceptionCode::IllegalDataAddress)?;
        *register = value;
        Ok(())
    }

    /// Execute a request against the map and produce the reply.
    ///
    /// Writes are applied completely or not at all.
    pub fn apply(&mut self, request: &Request) -> Result<Response, ExceptionCode> {
        match request {
            Request::ReadHoldingRegisters(addr, cnt) => {
                if *cnt == 0 || *cnt > MAX_READ_QUANTITY {
                    return Err(ExceptionCode::IllegalDataValue);
                }
                check_range(*addr, usize::from(*cnt))?;
                (*addr..*addr + *cnt)
                    .map(|addr| self.get(addr).ok_or(ExceptionCode::IllegalDataAddress))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Response::ReadHoldingRegisters)
            }
            Request::WriteSingleRegister(addr, value) => {
                self.set(*addr, *value)?;
                Ok(Response::WriteSingleRegister(*addr, *value))
            }
            Request::WriteMultipleRegisters(addr, values) => {
                if values.is_empty() || values.len() > MAX_WRITE_QUANTITY {
                    return Err(ExceptionCode::IllegalDataValue);
                }
                check_range(*addr, values.len())?;
                for (addr, value) in (*addr..).zip(values) {
                    self.set(addr, *value)?;
                }
                #[allow(clippy::cast_possible_truncation)]
                let quantity = values.len() as Quantity;
                Ok(Response::WriteMultipleRegisters(*addr, quantity))
            }
            Request::Custom(code, _) => {
                log::warn!("Unsupported function code in request: 0x{code:02X}");
                Err(ExceptionCode::IllegalFunction)
            }
        }
    }
}

fn check_range(addr: Address, cnt: usize) -> Result<(), ExceptionCode> {
    if usize::from(addr) + cnt > usize::from(RegisterMap::LEN) {
        log::debug!("Register range {addr}+{cnt} is not mapped");
        return Err(ExceptionCode::IllegalDataAddress);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_map_is_zeroed() {
        let map = RegisterMap::new();
        assert_eq!(map.get(TEMPERATURE_REGISTER), Some(0));
        assert_eq!(map.get(CONTROL_REGISTER), Some(0));
        assert_eq!(map.get(2), None);
    }

    #[test]
    fn read_both_registers() {
        let mut map = RegisterMap::new();
        map.set_temperature(48_312);
        map.set(CONTROL_REGISTER, 1).unwrap();
        assert_eq!(
            map.apply(&Request::ReadHoldingRegisters(0, 2)),
            Ok(Response::ReadHoldingRegisters(vec![48_312, 1]))
        );
        assert_eq!(
            map.apply(&Request::ReadHoldingRegisters(1, 1)),
            Ok(Response::ReadHoldingRegisters(vec![1]))
        );
    }

    #[test]
    fn write_then_read_control() {
        let mut map = RegisterMap::new();
        for value in [1, 0, 7, Word::MAX] {
            assert_eq!(
                map.apply(&Request::WriteSingleRegister(CONTROL_REGISTER, value)),
                Ok(Response::WriteSingleRegister(CONTROL_REGISTER, value))
            );
            assert_eq!(
                map.apply(&Request::ReadHoldingRegisters(CONTROL_REGISTER, 1)),
                Ok(Response::ReadHoldingRegisters(vec![value]))
            );
        }
    }

    #[test]
    fn write_multiple_registers() {
        let mut map = RegisterMap::new();
        assert_eq!(
            map.apply(&Request::WriteMultipleRegisters(0, vec![21_000, 1])),
            Ok(Response::WriteMultipleRegisters(0, 2))
        );
        assert_eq!(map.temperature(), 21_000);
        assert_eq!(map.control(), 1);
    }

    #[test]
    fn out_of_range_access() {
        let mut map = RegisterMap::new();
        assert_eq!(
            map.apply(&Request::ReadHoldingRegisters(1, 2)),
            Err(ExceptionCode::IllegalDataAddress)
        );
        assert_eq!(
            map.apply(&Request::ReadHoldingRegisters(Address::MAX, 1)),
            Err(ExceptionCode::IllegalDataAddress)
        );
        assert_eq!(
            map.apply(&Request::WriteSingleRegister(2, 1)),
            Err(ExceptionCode::IllegalDataAddress)
        );
        assert_eq!(
            map.apply(&Request::WriteMultipleRegisters(1, vec![5, 5])),
            Err(ExceptionCode::IllegalDataAddress)
        );
        // Nothing has been written partially.
        assert_eq!(map.control(), 0);
    }

    #[test]
    fn invalid_quantity() {
        let mut map = RegisterMap::new();
        assert_eq!(
            map.apply(&Request::ReadHoldingRegisters(0, 0)),
            Err(ExceptionCode::IllegalDataValue)
        );
        assert_eq!(
            map.apply(&Request::WriteMultipleRegisters(0, vec![])),
            Err(ExceptionCode::IllegalDataValue)
        );
    }

    #[test]
    fn unsupported_function() {
        let mut map = RegisterMap::new();
        assert_eq!(
            map.apply(&Request::Custom(0x01, vec![0, 0, 0, 1])),
            Err(ExceptionCode::IllegalFunction)
        );
    }
}
