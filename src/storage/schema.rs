//! Table layouts of the backend client database.
//!
//! Statements are idempotent. Columns added after the first release are
//! listed in [`COLUMN_MIGRATIONS`] and applied when missing.

pub const CREATE_KNOWN_NODES: &str = r#"
CREATE TABLE IF NOT EXISTS known_nodes (
  network_address BIGINT UNSIGNED NOT NULL,
  node_address INT UNSIGNED NOT NULL,
  last_time TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
  voltage DOUBLE NULL,
  node_role SMALLINT UNSIGNED NULL,
  firmware_version INT UNSIGNED NULL,
  scratchpad_seq INT UNSIGNED NULL,
  hw_magic INT UNSIGNED NULL,
  stack_profile INT UNSIGNED NULL,
  boot_count INT UNSIGNED NULL,
  file_line_num INT UNSIGNED NULL,
  file_name_hash INT UNSIGNED NULL,
  UNIQUE INDEX node (network_address, node_address)
) ENGINE = MYISAM
"#;

pub const CREATE_RECEIVED_PACKETS: &str = r#"
CREATE TABLE IF NOT EXISTS received_packets (
  id BIGINT NOT NULL AUTO_INCREMENT UNIQUE,
  logged_time TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
  launch_time TIMESTAMP NULL,
  path_delay_ms BIGINT UNSIGNED NOT NULL,
  network_address BIGINT UNSIGNED NOT NULL,
  sink_address INT UNSIGNED NOT NULL,
  source_address INT UNSIGNED NOT NULL,
  dest_address INT UNSIGNED NOT NULL,
  source_endpoint SMALLINT UNSIGNED NOT NULL,
  dest_endpoint SMALLINT UNSIGNED NOT NULL,
  qos SMALLINT UNSIGNED NOT NULL,
  num_bytes SMALLINT UNSIGNED NOT NULL,
  hop_count SMALLINT UNSIGNED DEFAULT NULL,
  PRIMARY KEY (id),
  INDEX (logged_time),
  INDEX (launch_time),
  INDEX (source_address),
  INDEX packets_from_node (network_address, source_address)
) ENGINE = MYISAM
"#;

pub const CREATE_DIAGNOSTIC_TRAFFIC: &str = r#"
CREATE TABLE IF NOT EXISTS diagnostic_traffic (
  received_packet BIGINT NOT NULL,
  access_cycles INT UNSIGNED NOT NULL,
  cluster_channel SMALLINT UNSIGNED NOT NULL,
  channel_reliability SMALLINT UNSIGNED NOT NULL,
  rx_count INT UNSIGNED NOT NULL,
  tx_count INT UNSIGNED NOT NULL,
  aloha_rxs SMALLINT UNSIGNED NOT NULL,
  resv_rx_ok SMALLINT UNSIGNED NOT NULL,
  data_rxs SMALLINT UNSIGNED NOT NULL,
  dup_rxs SMALLINT UNSIGNED NOT NULL,
  cca_ratio SMALLINT UNSIGNED NOT NULL,
  bcast_ratio SMALLINT UNSIGNED NOT NULL,
  tx_unicast_fail SMALLINT UNSIGNED NOT NULL,
  resv_usage_max SMALLINT UNSIGNED NOT NULL,
  resv_usage_avg SMALLINT UNSIGNED NOT NULL,
  aloha_usage_max SMALLINT UNSIGNED NOT NULL,
  FOREIGN KEY (received_packet) REFERENCES received_packets(id)
) ENGINE = MYISAM
"#;

pub const CREATE_DIAGNOSTIC_NEIGHBOR: &str = r#"
CREATE TABLE IF NOT EXISTS diagnostic_neighbor (
  received_packet BIGINT NOT NULL,
  node_address INT UNSIGNED NOT NULL,
  cluster_channel SMALLINT UNSIGNED NOT NULL,
  radio_power SMALLINT UNSIGNED NOT NULL,
  device_info SMALLINT UNSIGNED NOT NULL,
  norm_rssi SMALLINT UNSIGNED NOT NULL,
  FOREIGN KEY (received_packet) REFERENCES received_packets(id)
) ENGINE = MYISAM
"#;

pub const CREATE_DIAGNOSTIC_NODE: &str = r#"
CREATE TABLE IF NOT EXISTS diagnostic_node (
  received_packet BIGINT NOT NULL,
  access_cycle_ms INT UNSIGNED NOT NULL,
  node_role SMALLINT UNSIGNED NOT NULL,
  voltage DOUBLE NOT NULL,
  buf_usage_max SMALLINT UNSIGNED NOT NULL,
  buf_usage_avg SMALLINT UNSIGNED NOT NULL,
  mem_alloc_fails SMALLINT UNSIGNED NOT NULL,
  tc0_delay SMALLINT UNSIGNED NOT NULL,
  tc1_delay SMALLINT UNSIGNED NOT NULL,
  network_scans SMALLINT UNSIGNED NOT NULL,
  downlink_delay_avg_0 INT UNSIGNED NOT NULL,
  downlink_delay_min_0 INT UNSIGNED NOT NULL,
  downlink_delay_max_0 INT UNSIGNED NOT NULL,
  downlink_delay_samples_0 INT UNSIGNED NOT NULL,
  downlink_delay_avg_1 INT UNSIGNED NOT NULL,
  downlink_delay_min_1 INT UNSIGNED NOT NULL,
  downlink_delay_max_1 INT UNSIGNED NOT NULL,
  downlink_delay_samples_1 INT UNSIGNED NOT NULL,
  dropped_packets_0 SMALLINT UNSIGNED NOT NULL,
  dropped_packets_1 SMALLINT UNSIGNED NOT NULL,
  route_address INT UNSIGNED NOT NULL,
  next_hop_address_0 INT UNSIGNED NOT NULL,
  cost_0 SMALLINT UNSIGNED NOT NULL,
  quality_0 SMALLINT UNSIGNED NOT NULL,
  next_hop_address_1 INT UNSIGNED NOT NULL,
  cost_1 SMALLINT UNSIGNED NOT NULL,
  quality_1 SMALLINT UNSIGNED NOT NULL,
  FOREIGN KEY (received_packet) REFERENCES received_packets(id)
) ENGINE = MYISAM
"#;

pub const CREATE_DIAGNOSTIC_EVENT: &str = r#"
CREATE TABLE IF NOT EXISTS diagnostic_event (
  received_packet BIGINT NOT NULL,
  position SMALLINT NOT NULL,
  event SMALLINT NOT NULL,
  FOREIGN KEY (received_packet) REFERENCES received_packets(id),
  UNIQUE INDEX event_id (received_packet, position)
) ENGINE = MYISAM
"#;

pub const CREATE_DIAGNOSTIC_BOOT: &str = r#"
CREATE TABLE IF NOT EXISTS diagnostic_boot (
  received_packet BIGINT NOT NULL,
  boot_count INT UNSIGNED NOT NULL,
  node_role SMALLINT UNSIGNED NOT NULL,
  firmware_version INT UNSIGNED NOT NULL,
  scratchpad_seq INT UNSIGNED NOT NULL,
  hw_magic INT UNSIGNED NOT NULL,
  stack_profile INT UNSIGNED NOT NULL,
  otap_enabled BOOL NOT NULL,
  file_line_num INT UNSIGNED NOT NULL,
  file_name_hash INT UNSIGNED NOT NULL,
  stack_trace_0 INT UNSIGNED NOT NULL,
  stack_trace_1 INT UNSIGNED NOT NULL,
  stack_trace_2 INT UNSIGNED NOT NULL,
  current_seq INT UNSIGNED DEFAULT NULL,
  FOREIGN KEY (received_packet) REFERENCES received_packets(id)
) ENGINE = MYISAM
"#;

pub const CREATE_SINK_COMMAND: &str = r#"
CREATE TABLE IF NOT EXISTS sink_command (
  id BIGINT NOT NULL AUTO_INCREMENT UNIQUE,
  address INT UNSIGNED NOT NULL,
  command varchar(255),
  param LONGBLOB,
  launch_time TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
  ready_time TIMESTAMP NULL,
  result INT UNSIGNED,
  PRIMARY KEY (id),
  INDEX(address)
) ENGINE = MYISAM
"#;

pub const CREATE_REMOTE_STATUS: &str = r#"
CREATE TABLE IF NOT EXISTS remote_status (
  id BIGINT NOT NULL AUTO_INCREMENT UNIQUE,
  address INT UNSIGNED NOT NULL,
  sink_address INT UNSIGNED NOT NULL,
  reception_time TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
  crc INT UNSIGNED,
  otap_seq INT UNSIGNED NOT NULL,
  scratchpad_type INT UNSIGNED,
  scratchpad_status INT UNSIGNED,
  processed_length INT UNSIGNED,
  processed_crc INT UNSIGNED,
  processed_seq INT UNSIGNED,
  fw_mem_area_id INT UNSIGNED,
  fw_major_version INT UNSIGNED,
  fw_minor_version INT UNSIGNED,
  fw_maintenance_version INT UNSIGNED,
  fw_development_version INT UNSIGNED,
  seconds_until_update INT UNSIGNED,
  legacy_status INT UNSIGNED,
  PRIMARY KEY (id),
  INDEX(address),
  INDEX(sink_address)
) ENGINE = MYISAM
"#;

pub const CREATE_ADVERTISER: &str = r#"
CREATE TABLE IF NOT EXISTS advertiser (
  id BIGINT NOT NULL AUTO_INCREMENT UNIQUE,
  logged_time DATETIME(6) NULL,
  measured_time DATETIME(6) NULL,
  source_address DOUBLE NULL,
  destination_address INT NULL,
  source_endpoint INT NULL,
  destination_endpoint INT NULL,
  travel_time_ms BIGINT UNSIGNED NOT NULL,
  qos INT UNSIGNED NOT NULL,
  message_type BIGINT UNSIGNED NOT NULL,
  reserved BIGINT UNSIGNED NOT NULL,
  node_address INT UNSIGNED NOT NULL,
  value BIGINT SIGNED NOT NULL,
  payload BLOB,
  PRIMARY KEY (id),
  INDEX (logged_time),
  INDEX (measured_time),
  INDEX (message_type),
  INDEX (node_address)
) ENGINE = InnoDB
"#;

pub const CREATE_DIAGNOSTIC_EVENT_CODES: &str = r#"
CREATE TABLE IF NOT EXISTS diagnostic_event_codes (
  code SMALLINT UNSIGNED UNIQUE NOT NULL,
  name TEXT,
  description TEXT,
  PRIMARY KEY (code)
) ENGINE = MYISAM
"#;

pub const CREATE_FILE_NAME_HASHES: &str = r#"
CREATE TABLE IF NOT EXISTS file_name_hashes (
  id SMALLINT UNSIGNED NOT NULL UNIQUE,
  name TEXT,
  PRIMARY KEY (id)
) ENGINE = MYISAM
"#;

pub const CREATE_LOG: &str = r#"
CREATE TABLE IF NOT EXISTS log (
  recordtime text,
  debuglog text
) ENGINE = MYISAM
"#;

pub const TABLES: &[(&str, &str)] = &[
    ("known_nodes", CREATE_KNOWN_NODES),
    ("received_packets", CREATE_RECEIVED_PACKETS),
    ("diagnostic_traffic", CREATE_DIAGNOSTIC_TRAFFIC),
    ("diagnostic_neighbor", CREATE_DIAGNOSTIC_NEIGHBOR),
    ("diagnostic_node", CREATE_DIAGNOSTIC_NODE),
    ("diagnostic_event", CREATE_DIAGNOSTIC_EVENT),
    ("diagnostic_boot", CREATE_DIAGNOSTIC_BOOT),
    ("sink_command", CREATE_SINK_COMMAND),
    ("remote_status", CREATE_REMOTE_STATUS),
    ("advertiser", CREATE_ADVERTISER),
    ("diagnostic_event_codes", CREATE_DIAGNOSTIC_EVENT_CODES),
    ("file_name_hashes", CREATE_FILE_NAME_HASHES),
    ("log", CREATE_LOG),
];

/// A column that older databases lack.
pub struct ColumnMigration {
    pub table: &'static str,
    pub column: &'static str,
    pub alter: &'static str,
}

pub const COLUMN_MIGRATIONS: &[ColumnMigration] = &[
    ColumnMigration {
        table: "received_packets",
        column: "hop_count",
        alter: "ALTER TABLE received_packets ADD COLUMN hop_count SMALLINT UNSIGNED DEFAULT NULL",
    },
    ColumnMigration {
        table: "diagnostic_boot",
        column: "current_seq",
        alter: "ALTER TABLE diagnostic_boot ADD COLUMN current_seq INT UNSIGNED DEFAULT NULL",
    },
];

/// Triggers as (name, create statement). Each is dropped and recreated.
pub const TRIGGERS: &[(&str, &str)] = &[
    (
        "after_received_packets_insert",
        r#"
CREATE TRIGGER after_received_packets_insert AFTER INSERT
ON received_packets
FOR EACH ROW BEGIN
    INSERT INTO known_nodes (network_address, node_address, last_time)
    VALUES (new.network_address, new.source_address, CURRENT_TIMESTAMP)
    ON DUPLICATE KEY UPDATE last_time = CURRENT_TIMESTAMP;
END
"#,
    ),
    (
        "after_diagnostics_node_insert",
        r#"
CREATE TRIGGER after_diagnostics_node_insert AFTER INSERT
ON diagnostic_node
FOR EACH ROW BEGIN
    INSERT INTO known_nodes (network_address, node_address, voltage, node_role)
    SELECT rp.network_address, rp.source_address, new.voltage, new.node_role
    FROM received_packets rp
    WHERE rp.id = new.received_packet
    ON DUPLICATE KEY UPDATE voltage = new.voltage, node_role = new.node_role;
END
"#,
    ),
    (
        "after_diagnostic_boot_insert",
        r#"
CREATE TRIGGER after_diagnostic_boot_insert AFTER INSERT
ON diagnostic_boot
FOR EACH ROW BEGIN
    INSERT INTO known_nodes (
        network_address, node_address, node_role, firmware_version,
        scratchpad_seq, hw_magic, stack_profile, boot_count,
        file_line_num, file_name_hash)
    SELECT rp.network_address, rp.source_address, new.node_role,
        new.firmware_version, new.scratchpad_seq, new.hw_magic,
        new.stack_profile, new.boot_count, new.file_line_num,
        new.file_name_hash
    FROM received_packets rp
    WHERE rp.id = new.received_packet
    ON DUPLICATE KEY UPDATE
        node_role = new.node_role,
        firmware_version = new.firmware_version,
        scratchpad_seq = new.scratchpad_seq,
        hw_magic = new.hw_magic,
        stack_profile = new.stack_profile,
        boot_count = new.boot_count,
        file_line_num = new.file_line_num,
        file_name_hash = new.file_name_hash;
END
"#,
    ),
];

/// Diagnostic event catalogue as (code, name, description).
pub const DIAGNOSTIC_EVENT_CODES: &[(u16, &str, &str)] = &[
    (0x08, "role_change_to_subnode", "Role change: change to subnode"),
    (0x09, "role_change_to_headnode", "Role change: change to headnode"),
    (0x10, "route_change_unknown", "Route change: unknown reason"),
    (0x18, "scan_ftdma_adjust", "Scan: changing channel or no cluster channel selected"),
    (0x19, "scan_f_confl_near_nbor", "Scan: FTDMA conflict with cluster"),
    (0x1a, "scan_f_confl_far_nbor", "Scan: FTDMA conflict with neighbor's neighbor"),
    (0x1b, "scan_t_confl_nbor", "Scan: timing conflict with cluster"),
    (0x1c, "scan_t_confl_between_nbors", "Scan: timing conflict between two or more clusters"),
    (0x1d, "scan_need_nbors", "Scan: need more clusters"),
    (0x1e, "scan_periodic", "Scan: periodic scan"),
    (0x1f, "scan_role_change", "Scan: role change"),
    (0x20, "boot_por", "Boot: power-on reset"),
    (0x21, "boot_intentional", "Boot: reboot requested"),
    (0x22, "boot_assert", "Boot: software assert"),
    (0x23, "boot_fault", "Boot: fault handler"),
    (0x24, "boot_wdt", "Boot: watchdog timer"),
    (0x25, "boot_unknown", "Boot: unknown reason"),
    (0x28, "sync_lost_synced", "Sync lost: lost sync to synced cluster"),
    (0x29, "sync_lost_joined", "Sync lost: lost sync to next hop cluster"),
    (0x30, "tdma_adjust_minor_boundary", "TDMA adjust: minor boundary adjust"),
    (0x31, "tdma_adjust_major_boundary", "TDMA adjust: not in slot boundary"),
    (0x32, "tdma_adjust_next_hop", "TDMA adjust: FTDMA conflict with next hop"),
    (0x33, "tdma_adjust_cluster", "TDMA adjust: FTDMA conflict with neighboring cluster"),
    (0x34, "tdma_adjust_neighbor", "TDMA adjust: FTDMA conflict with neighbor"),
    (0x35, "tdma_adjust_no_channel", "TDMA adjust: no channel"),
    (0x36, "tdma_adjust_blacklist", "TDMA adjust: channel change due to blacklisting"),
    (0x37, "tdma_adjust_unknown", "TDMA adjust: unknown reason"),
    // 0x38 used to be peripheral_fail_unknown; the later definition wins.
    (56, "sink_changed", "Changed routing to another sink"),
    (57, "fhma_adjust", "FHMA adjust event"),
    (0x40, "routing_loop_unknown", "Routing loop: unknown reason"),
    (72, "subnode_removed", "Removed subnode member in favour of headnode"),
    (73, "ll_dl_fail_chead", "Cluster head: removed member due to failing LL downklink"),
    (74, "ll_dl_fail_member", "Member: removed from the cluster head due to failing LL downlink"),
    (75, "ll_ul_fail", "Cluster removed due to failing LL communication"),
    (76, "scan too many results", "Too many scan results to process (could also be temporal)"),
    (77, "own_active_late", "Own active start was late"),
];
