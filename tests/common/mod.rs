//! Shared test infrastructure: in-process UDP mock agents.

#![allow(dead_code)]

pub mod agent;

pub use agent::{MockAgent, MockAgentBuilder, V3Agent};

use snmpkit::oid::Oid;
use snmpkit::value::Value;
use snmpkit::oid;
use std::collections::BTreeMap;

/// A small system-group MIB.
pub fn system_mib() -> BTreeMap<Oid, Value> {
    let mut mib = BTreeMap::new();
    mib.insert(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::from("linux"));
    mib.insert(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::TimeTicks(123456));
    mib.insert(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::from("test-agent"));
    mib
}

/// Four ifDescr entries under 1.3.6.1.2.1.2.2.1.2.
pub fn if_descr_mib() -> BTreeMap<Oid, Value> {
    let mut mib = BTreeMap::new();
    mib.insert(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2, 1), Value::from("lo"));
    mib.insert(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2, 2), Value::from("eth0"));
    mib.insert(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2, 3), Value::from("eth1"));
    mib.insert(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2, 4), Value::from("wlan0"));
    mib
}
