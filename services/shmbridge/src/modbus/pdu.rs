//! Modbus TCP framing and coil PDUs
//!
//! Only the coil function codes are understood. Coil payloads are packed
//! LSB-first, the same bit order as the region image.

use shm_rtdb::bitcodec::{bits_to_bytes, bytes_to_bits, packed_len};
use tracing::debug;

/// MBAP header length (transaction id, protocol id, length, unit id)
pub const MBAP_HEADER_LEN: usize = 7;
/// Largest PDU a Modbus TCP frame can carry
pub const MAX_PDU_SIZE: usize = 253;
/// Largest value of the MBAP length field (unit id + PDU)
pub const MAX_MBAP_LENGTH: u16 = MAX_PDU_SIZE as u16 + 1;

pub const FC_READ_COILS: u8 = 0x01;
pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;
pub const FC_WRITE_MULTIPLE_COILS: u8 = 0x0F;

pub const MAX_READ_COILS: u16 = 2000;
pub const MAX_WRITE_COILS: u16 = 1968;

const COIL_ON: u16 = 0xFF00;
const COIL_OFF: u16 = 0x0000;

/// Exception codes returned in place of a normal response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExceptionCode {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
    ServerDeviceFailure = 0x04,
}

/// Modbus application protocol header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    pub transaction_id: u16,
    pub protocol_id: u16,
    /// Byte count of unit id plus PDU
    pub length: u16,
    pub unit_id: u8,
}

impl MbapHeader {
    pub fn parse(buf: &[u8; MBAP_HEADER_LEN]) -> Self {
        Self {
            transaction_id: u16::from_be_bytes([buf[0], buf[1]]),
            protocol_id: u16::from_be_bytes([buf[2], buf[3]]),
            length: u16::from_be_bytes([buf[4], buf[5]]),
            unit_id: buf[6],
        }
    }

    /// Modbus protocol id and a length that leaves room for at least a function code
    pub fn is_valid(&self) -> bool {
        self.protocol_id == 0 && (2..=MAX_MBAP_LENGTH).contains(&self.length)
    }

    /// Length of the PDU following the header
    pub fn pdu_len(&self) -> usize {
        usize::from(self.length).saturating_sub(1)
    }
}

/// Wrap a response PDU in an MBAP header echoing the request ids
pub fn encode_frame(request: &MbapHeader, pdu: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(MBAP_HEADER_LEN + pdu.len());
    frame.extend_from_slice(&request.transaction_id.to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00]); // Protocol ID
    frame.extend_from_slice(&(pdu.len() as u16 + 1).to_be_bytes());
    frame.push(request.unit_id);
    frame.extend_from_slice(pdu);
    frame
}

/// Decoded coil request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoilRequest {
    ReadCoils { start: u16, quantity: u16 },
    WriteSingleCoil { address: u16, value: bool },
    WriteMultipleCoils { start: u16, values: Vec<bool> },
}

impl CoilRequest {
    /// Parse a request PDU (function code first)
    pub fn parse(pdu: &[u8]) -> Result<Self, ExceptionCode> {
        let (&fc, body) = pdu.split_first().ok_or(ExceptionCode::IllegalFunction)?;
        debug!(
            "Request PDU: FC={:02X} ({}), data_len={}",
            fc,
            function_code_description(fc),
            body.len()
        );

        match fc {
            FC_READ_COILS => {
                let (start, quantity) = read_pair(body)?;
                if quantity == 0 || quantity > MAX_READ_COILS {
                    return Err(ExceptionCode::IllegalDataValue);
                }
                Ok(Self::ReadCoils { start, quantity })
            },
            FC_WRITE_SINGLE_COIL => {
                let (address, raw) = read_pair(body)?;
                let value = match raw {
                    COIL_ON => true,
                    COIL_OFF => false,
                    _ => return Err(ExceptionCode::IllegalDataValue),
                };
                Ok(Self::WriteSingleCoil { address, value })
            },
            FC_WRITE_MULTIPLE_COILS => {
                let (start, quantity) = read_pair(body)?;
                if quantity == 0 || quantity > MAX_WRITE_COILS {
                    return Err(ExceptionCode::IllegalDataValue);
                }
                let byte_count = body.get(4).copied().ok_or(ExceptionCode::IllegalDataValue)?;
                let data = &body[5.min(body.len())..];
                if usize::from(byte_count) != packed_len(usize::from(quantity))
                    || data.len() != usize::from(byte_count)
                {
                    return Err(ExceptionCode::IllegalDataValue);
                }
                let mut values = bytes_to_bits(data);
                values.truncate(usize::from(quantity));
                Ok(Self::WriteMultipleCoils { start, values })
            },
            _ => Err(ExceptionCode::IllegalFunction),
        }
    }
}

fn read_pair(body: &[u8]) -> Result<(u16, u16), ExceptionCode> {
    match body {
        [a0, a1, b0, b1, ..] => Ok((
            u16::from_be_bytes([*a0, *a1]),
            u16::from_be_bytes([*b0, *b1]),
        )),
        _ => Err(ExceptionCode::IllegalDataValue),
    }
}

/// FC01 response: byte count then packed coil values
pub fn read_coils_response(values: &[bool]) -> Vec<u8> {
    let packed = bits_to_bytes(values, packed_len(values.len()));
    let mut pdu = Vec::with_capacity(2 + packed.len());
    pdu.push(FC_READ_COILS);
    pdu.push(packed.len() as u8);
    pdu.extend_from_slice(&packed);
    pdu
}

/// FC05 response echoes the request
pub fn write_single_coil_response(address: u16, value: bool) -> Vec<u8> {
    let raw = if value { COIL_ON } else { COIL_OFF };
    let mut pdu = vec![FC_WRITE_SINGLE_COIL];
    pdu.extend_from_slice(&address.to_be_bytes());
    pdu.extend_from_slice(&raw.to_be_bytes());
    pdu
}

/// FC15 response: start address and quantity written
pub fn write_multiple_coils_response(start: u16, quantity: u16) -> Vec<u8> {
    let mut pdu = vec![FC_WRITE_MULTIPLE_COILS];
    pdu.extend_from_slice(&start.to_be_bytes());
    pdu.extend_from_slice(&quantity.to_be_bytes());
    pdu
}

pub fn exception_response(function_code: u8, code: ExceptionCode) -> Vec<u8> {
    vec![function_code | 0x80, code as u8]
}

fn function_code_description(fc: u8) -> &'static str {
    match fc & 0x7F {
        FC_READ_COILS => "Read Coils",
        FC_WRITE_SINGLE_COIL => "Write Single Coil",
        FC_WRITE_MULTIPLE_COILS => "Write Multiple Coils",
        _ => "Unsupported Function",
    }
}
