//! Standard node entry types.
//!
//! These are the record layouts written by the reference node firmware. The
//! receive and transmit types share common leading fields, which are defined
//! once as virtual bases (`RX_COMMON_FIELDS`, `TX_HIGH_COMMON_FIELDS`,
//! `TX_LOW_COMMON_FIELDS`) and copied into each stored type.
//!
//! Every definition here is a literal covered by the tests below; a malformed
//! built-in definition panics at registration.

use std::sync::Arc;

use crate::entry::field::fd;
use crate::entry::{
    EntryTypeSchema, FieldDef, LtgPayloadFields, MacHeaderAddresses, PostDecodeHook,
    SchemaRegistry,
};

pub const NODE_INFO: u16 = 1;
pub const EXP_INFO: u16 = 2;
pub const TIME_INFO: u16 = 3;
pub const NODE_TEMPERATURE: u16 = 4;
pub const RX_DSSS: u16 = 10;
pub const RX_OFDM: u16 = 11;
pub const RX_OFDM_LTG: u16 = 12;
pub const TX_HIGH: u16 = 20;
pub const TX_HIGH_LTG: u16 = 21;
pub const TX_LOW: u16 = 30;
pub const TX_LOW_LTG: u16 = 31;
pub const CMD_INFO: u16 = 40;

/// Bytes of a frame captured in non-LTG entries: one MAC header.
const MAC_PAYLOAD_LEN: usize = 24;
/// Bytes captured in LTG entries: MAC header, LLC header and LTG payload.
const LTG_MAC_PAYLOAD_LEN: usize = 44;

fn schema(name: &str, type_id: Option<u16>, description: &str) -> EntryTypeSchema {
    match EntryTypeSchema::new(name, type_id) {
        Ok(mut schema) => {
            schema.set_description(description);
            schema
        }
        Err(e) => panic!("bad built-in entry type '{name}': {e}"),
    }
}

fn append(schema: &mut EntryTypeSchema, fields: Vec<FieldDef>) {
    if let Err(e) = schema.append_fields(fields) {
        panic!("bad built-in entry type '{}': {e}", schema.name());
    }
}

fn derive(base: &EntryTypeSchema, name: &str, type_id: u16, description: &str) -> EntryTypeSchema {
    let mut schema = schema(name, Some(type_id), description);
    if let Err(e) = schema.extend_from(base) {
        panic!("bad built-in entry type '{name}': {e}");
    }
    schema
}

fn mac_payload_fields(len: usize) -> Vec<FieldDef> {
    vec![
        fd(
            "mac_payload_len",
            "I",
            "uint32",
            "Length in bytes of MAC payload recorded in log for this packet",
        ),
        fd(
            "mac_payload",
            &format!("{len}s"),
            &format!("{len}uint8"),
            "First bytes of MAC payload: typically the 802.11 MAC header",
        ),
    ]
}

fn phy_mode_consts() -> Vec<(String, u64)> {
    consts(&[("NONHT", 0x1), ("HTMF", 0x2), ("DSSS", 0x4)])
}

fn pkt_type_consts() -> Vec<(String, u64)> {
    consts(&[
        ("BEACON", 1),
        ("PROBE_RESP", 2),
        ("DATA", 3),
        ("MGMT", 4),
        ("CTRL", 5),
        ("LTG", 6),
    ])
}

fn consts(pairs: &[(&str, u64)]) -> Vec<(String, u64)> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn node_info() -> EntryTypeSchema {
    let mut s = schema(
        "NODE_INFO",
        Some(NODE_INFO),
        "Details about the node hardware and its configuration.",
    );
    append(
        &mut s,
        vec![
            fd(
                "timestamp",
                "Q",
                "uint64",
                "Microsecond timer value at time of log entry creation",
            ),
            fd(
                "node_type",
                "I",
                "uint32",
                "Code identifying applications in CPU High and CPU Low",
            ),
            fd(
                "node_id",
                "I",
                "uint32",
                "Node ID, as set during wlan_exp init",
            ),
            fd("hw_generation", "I", "uint32", "Node hardware generation"),
            fd("serial_num", "I", "uint32", "Node serial number"),
            fd("fpga_dna", "Q", "uint64", "Node FPGA DNA"),
            fd("wlan_mac_addr", "6s", "6uint8", "Node MAC address"),
            fd("padding0", "2x", "2uint8", ""),
        ],
    );
    s
}

fn exp_info() -> EntryTypeSchema {
    let mut s = schema(
        "EXP_INFO",
        Some(EXP_INFO),
        "Record of arbitrary information added to the log by the experiment.",
    );
    append(
        &mut s,
        vec![
            fd(
                "timestamp",
                "Q",
                "uint64",
                "Microsecond timer value at time of log entry creation",
            ),
            fd(
                "info_type",
                "H",
                "uint16",
                "Exp info type - arbitrary value supplied by application",
            ),
            fd(
                "info_len",
                "H",
                "uint16",
                "Exp info length - describes byte length of info field",
            ),
        ],
    );
    s
}

fn time_info() -> EntryTypeSchema {
    let mut s = schema(
        "TIME_INFO",
        Some(TIME_INFO),
        "Record of a change to the node's timestamp or of a host-requested time marker.",
    );
    append(
        &mut s,
        vec![
            fd(
                "timestamp",
                "Q",
                "uint64",
                "Microsecond timer value at time of log entry creation",
            ),
            fd(
                "time_id",
                "I",
                "uint32",
                "Random ID value included in wlan_exp TIME_INFO command",
            ),
            fd(
                "reason",
                "I",
                "uint32",
                "Reason code for TIME_INFO log entry creation",
            ),
            fd(
                "mac_timestamp",
                "Q",
                "uint64",
                "MAC timestamp in microseconds",
            ),
            fd(
                "system_timestamp",
                "Q",
                "uint64",
                "System timestamp in microseconds",
            ),
            fd(
                "host_timestamp",
                "Q",
                "uint64",
                "Host timestamp in microseconds",
            ),
        ],
    );
    s.add_constants(
        "reason",
        consts(&[
            ("SYSTEM", 0),
            ("WLAN_EXP_SET_TIME", 1),
            ("WLAN_EXP_ADD_LOG", 2),
        ]),
    );
    s
}

fn node_temperature() -> EntryTypeSchema {
    let mut s = schema(
        "NODE_TEMPERATURE",
        Some(NODE_TEMPERATURE),
        "Record of the FPGA system monitor die temperature, sampled periodically.",
    );
    append(
        &mut s,
        vec![
            fd(
                "timestamp",
                "Q",
                "uint64",
                "Microsecond timer value at time of log entry creation",
            ),
            fd(
                "temp_current",
                "I",
                "uint32",
                "Current FPGA die temperature (deg C)",
            ),
            fd(
                "temp_min",
                "I",
                "uint32",
                "Minimum FPGA die temperature since FPGA configuration",
            ),
            fd(
                "temp_max",
                "I",
                "uint32",
                "Maximum FPGA die temperature since FPGA configuration",
            ),
        ],
    );
    s
}

fn cmd_info() -> EntryTypeSchema {
    let mut s = schema(
        "CMD_INFO",
        Some(CMD_INFO),
        "Record of a command received by the node.",
    );
    append(
        &mut s,
        vec![
            fd(
                "timestamp",
                "Q",
                "uint64",
                "Microsecond timer value at time of log entry creation",
            ),
            fd("command_id", "I", "uint32", "ID of the command"),
            fd("src_id", "H", "uint16", "Node ID of the command source"),
            fd("num_args", "H", "uint16", "Number of arguments used"),
            fd("args", "10I", "10uint32", "Command arguments"),
        ],
    );
    s
}

fn rx_common() -> EntryTypeSchema {
    let mut s = schema(
        "RX_COMMON_FIELDS",
        None,
        "Fields common to every reception entry type.",
    );
    append(
        &mut s,
        vec![
            fd(
                "timestamp",
                "Q",
                "uint64",
                "Value of MAC Time in microseconds at PHY RX start",
            ),
            fd(
                "timestamp_frac",
                "B",
                "uint8",
                "Fractional part of timestamp (units of 6.25ns)",
            ),
            fd("phy_samp_rate", "B", "uint8", "PHY sampling rate in MSps"),
            fd("length", "H", "uint16", "Length of payload in bytes"),
            fd(
                "cfo_est",
                "i",
                "int32",
                "Time-domain CFO estimate from Rx PHY; Fix32_31 value, CFO as fraction of sampling frequency",
            ),
            fd("mcs", "B", "uint8", "MCS index, in [0:7]"),
            fd("phy_mode", "B", "uint8", "PHY mode index"),
            fd(
                "ant_mode",
                "B",
                "uint8",
                "Antenna mode: [1,2,3,4] for SISO Rx on RF [A,B,C,D]",
            ),
            fd("power", "b", "int8", "Rx power in dBm"),
            fd("padding0", "x", "uint8", ""),
            fd("channel", "B", "uint8", "Channel (center frequency) index"),
            fd(
                "rf_gain",
                "B",
                "uint8",
                "AGC RF gain setting: [1,2,3] for [0,15,30]dB gain",
            ),
            fd(
                "bb_gain",
                "B",
                "uint8",
                "AGC BB gain setting: [0:31] for approx [0:63]dB gain",
            ),
            fd("flags", "H", "uint16", "1-bit flags"),
            fd("padding1", "2x", "2uint8", ""),
        ],
    );
    s.add_constants(
        "flags",
        consts(&[
            ("FCS_GOOD", 0x0001),
            ("DUPLICATE", 0x0002),
            ("UNEXPECTED_RESPONSE", 0x0004),
            ("LTG_PYLD", 0x0040),
            ("LTG", 0x0080),
        ]),
    );
    s.add_constants("phy_mode", phy_mode_consts());
    s
}

fn rx_dsss(common: &EntryTypeSchema) -> EntryTypeSchema {
    let mut s = derive(
        common,
        "RX_DSSS",
        RX_DSSS,
        "Reception of a DSSS (11b) packet.",
    );
    append(&mut s, mac_payload_fields(MAC_PAYLOAD_LEN));
    s
}

fn rx_ofdm(
    common: &EntryTypeSchema,
    name: &str,
    type_id: u16,
    payload_len: usize,
) -> EntryTypeSchema {
    let mut s = derive(
        common,
        name,
        type_id,
        "Reception of an OFDM packet, with the channel estimates of each subcarrier.",
    );
    let mut fields = vec![fd(
        "chan_est",
        "256B",
        "(64,2)i2",
        "OFDM Rx channel estimates, packed as [(uint16)I (uint16)Q] values, one per subcarrier",
    )];
    fields.extend(mac_payload_fields(payload_len));
    append(&mut s, fields);
    s
}

fn tx_high_common() -> EntryTypeSchema {
    let mut s = schema(
        "TX_HIGH_COMMON_FIELDS",
        None,
        "Fields common to every CPU High transmission entry type.",
    );
    append(
        &mut s,
        vec![
            fd(
                "timestamp_create",
                "Q",
                "uint64",
                "Microsecond timer value at time packet was created",
            ),
            fd(
                "delay_accept",
                "I",
                "uint32",
                "Time in microseconds between timestamp_create and packet acceptance by CPU Low",
            ),
            fd(
                "delay_done",
                "I",
                "uint32",
                "Time in microseconds between acceptance and transmission completion",
            ),
            fd(
                "unique_seq",
                "Q",
                "uint64",
                "Unique sequence number for packet",
            ),
            fd(
                "num_tx",
                "B",
                "uint8",
                "Number of transmissions, including retransmissions",
            ),
            fd(
                "tx_power",
                "b",
                "int8",
                "Transmit power in dBm of the first transmission",
            ),
            fd("chan_num", "B", "uint8", "Channel (center frequency) index"),
            fd("mcs", "B", "uint8", "MCS index of the first transmission"),
            fd("phy_mode", "B", "uint8", "PHY mode index"),
            fd(
                "ant_mode",
                "B",
                "uint8",
                "Antenna mode of the first transmission",
            ),
            fd("padding0", "2x", "2uint8", ""),
            fd(
                "length",
                "H",
                "uint16",
                "Length in bytes of MPDU, including MAC header and FCS",
            ),
            fd(
                "result",
                "B",
                "uint8",
                "Transmission result: 0 = ACK received or not required, 1 = no ACK",
            ),
            fd("pkt_type", "B", "uint8", "Packet type"),
            fd(
                "queue_id",
                "H",
                "uint16",
                "Tx queue ID from which the packet was retrieved",
            ),
            fd(
                "queue_occupancy",
                "H",
                "uint16",
                "Occupancy of the Tx queue (including this packet) when enqueued",
            ),
        ],
    );
    s.add_constants("result", consts(&[("SUCCESS", 0), ("FAILURE", 1)]));
    s.add_constants("pkt_type", pkt_type_consts());
    s.add_constants("phy_mode", phy_mode_consts());
    s
}

fn tx_low_common() -> EntryTypeSchema {
    let mut s = schema(
        "TX_LOW_COMMON_FIELDS",
        None,
        "Fields common to every CPU Low transmission entry type.",
    );
    append(
        &mut s,
        vec![
            fd(
                "timestamp_send",
                "Q",
                "uint64",
                "Value of MAC Time in microseconds when packet transmission actually started",
            ),
            fd(
                "unique_seq",
                "Q",
                "uint64",
                "Unique sequence number of the original packet",
            ),
            fd("mcs", "B", "uint8", "MCS index"),
            fd("phy_mode", "B", "uint8", "PHY mode index"),
            fd("ant_mode", "B", "uint8", "PHY antenna mode"),
            fd("tx_power", "b", "int8", "Transmit power in dBm"),
            fd("reserved0", "B", "uint8", ""),
            fd("channel", "B", "uint8", "Channel (center frequency) index"),
            fd(
                "length",
                "H",
                "uint16",
                "Length in bytes of MPDU, including MAC header and FCS",
            ),
            fd(
                "num_slots",
                "h",
                "int16",
                "Number of backoff slots allotted prior to this transmission",
            ),
            fd(
                "cw",
                "H",
                "uint16",
                "Contention window value at time of this transmission",
            ),
            fd("pkt_type", "B", "uint8", "Packet type"),
            fd("flags", "B", "uint8", "1-bit flags"),
            fd(
                "timestamp_send_frac",
                "B",
                "uint8",
                "Fractional part of timestamp_send (units of 6.25ns)",
            ),
            fd("phy_samp_rate", "B", "uint8", "PHY sampling rate in MSps"),
            fd(
                "tx_count",
                "H",
                "uint16",
                "Transmission index for this attempt, starting at 1",
            ),
            fd("padding0", "2x", "2uint8", ""),
        ],
    );
    s.add_constants("flags", consts(&[("RECEIVED_RESPONSE", 0x01)]));
    s.add_constants("pkt_type", pkt_type_consts());
    s.add_constants("phy_mode", phy_mode_consts());
    s
}

fn with_payload(
    base: &EntryTypeSchema,
    name: &str,
    type_id: u16,
    description: &str,
    payload_len: usize,
) -> EntryTypeSchema {
    let mut s = derive(base, name, type_id, description);
    append(&mut s, mac_payload_fields(payload_len));
    s
}

/// Register every standard entry type, virtual bases included.
pub fn register_standard_types(registry: &mut SchemaRegistry) {
    let mac_header: Arc<dyn PostDecodeHook> = Arc::new(MacHeaderAddresses);
    let ltg: Arc<dyn PostDecodeHook> = Arc::new(LtgPayloadFields);

    let rx = rx_common();
    let tx_high = tx_high_common();
    let tx_low = tx_low_common();

    let mut stored = vec![
        rx_dsss(&rx),
        rx_ofdm(&rx, "RX_OFDM", RX_OFDM, MAC_PAYLOAD_LEN),
        rx_ofdm(&rx, "RX_OFDM_LTG", RX_OFDM_LTG, LTG_MAC_PAYLOAD_LEN),
        with_payload(
            &tx_high,
            "TX_HIGH",
            TX_HIGH,
            "Transmission of a packet from CPU High, one entry per MPDU regardless of retransmissions.",
            MAC_PAYLOAD_LEN,
        ),
        with_payload(
            &tx_high,
            "TX_HIGH_LTG",
            TX_HIGH_LTG,
            "Transmission of a packet generated by a local traffic generator from CPU High.",
            LTG_MAC_PAYLOAD_LEN,
        ),
        with_payload(
            &tx_low,
            "TX_LOW",
            TX_LOW,
            "Record of each PHY transmission by CPU Low, including retransmissions.",
            MAC_PAYLOAD_LEN,
        ),
        with_payload(
            &tx_low,
            "TX_LOW_LTG",
            TX_LOW_LTG,
            "Record of each PHY transmission of a local traffic generator packet by CPU Low.",
            LTG_MAC_PAYLOAD_LEN,
        ),
    ];
    for s in &mut stored {
        s.add_shared_hook(Arc::clone(&mac_header));
        if s.name().ends_with("_LTG") {
            s.add_shared_hook(Arc::clone(&ltg));
        }
    }

    let unstored = [
        node_info(),
        exp_info(),
        time_info(),
        node_temperature(),
        cmd_info(),
        rx,
        tx_high,
        tx_low,
    ];
    for s in unstored.into_iter().chain(stored) {
        registry.register(s);
    }
}
