//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex, PoisonError};

use xmlbind::parser::InstanceComponent;
use xmlbind::schema::SchemaDocument;
use xmlbind::{
    parse_schema, Binding, Configuration, Encoder, EncoderOptions, ExecutionMode, Parser, ParserOptions, QName,
    Result, SimpleBinding, Value, ValueType,
};

/// Namespace of the purchase order fixture schema
pub const PO_NAMESPACE: &str = "urn:po";

/// Purchase order schema used across the tests
pub const PO_XSD: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:po="urn:po"
           targetNamespace="urn:po"
           elementFormDefault="qualified">

  <xs:complexType name="Base">
    <xs:sequence>
      <xs:element name="code" type="xs:string"/>
    </xs:sequence>
  </xs:complexType>

  <xs:complexType name="Derived">
    <xs:complexContent>
      <xs:extension base="po:Base">
        <xs:sequence>
          <xs:element name="extra" type="xs:string" minOccurs="0"/>
        </xs:sequence>
      </xs:extension>
    </xs:complexContent>
  </xs:complexType>

  <xs:simpleType name="Quantity">
    <xs:restriction base="xs:int"/>
  </xs:simpleType>

  <xs:simpleType name="Sizes">
    <xs:list itemType="xs:int"/>
  </xs:simpleType>

  <xs:element name="order">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="item" maxOccurs="unbounded">
          <xs:complexType>
            <xs:attribute name="count" type="xs:int"/>
          </xs:complexType>
        </xs:element>
        <xs:element name="note" type="xs:string" nillable="true" minOccurs="0"/>
        <xs:element name="sizes" type="po:Sizes" minOccurs="0"/>
      </xs:sequence>
      <xs:attribute name="id" type="xs:int"/>
    </xs:complexType>
  </xs:element>

  <xs:element name="product" type="po:Base"/>
  <xs:element name="special" type="po:Derived"/>
  <xs:element name="quantity" type="po:Quantity"/>
  <xs:element name="label" type="xs:string"/>
  <xs:element name="day" type="xs:date"/>

  <xs:complexType name="Money">
    <xs:simpleContent>
      <xs:extension base="xs:decimal">
        <xs:attribute name="currency" type="xs:string"/>
      </xs:extension>
    </xs:simpleContent>
  </xs:complexType>

  <xs:element name="cost" type="po:Money"/>
  <xs:element name="serial" type="xs:unsignedLong"/>

  <xs:element name="price">
    <xs:complexType>
      <xs:simpleContent>
        <xs:extension base="xs:decimal">
          <xs:attribute name="currency" type="xs:string"/>
        </xs:extension>
      </xs:simpleContent>
    </xs:complexType>
  </xs:element>

  <xs:element name="para">
    <xs:complexType mixed="true">
      <xs:sequence>
        <xs:element name="b" type="xs:string" minOccurs="0" maxOccurs="unbounded"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>

  <xs:element name="remark" type="xs:string"/>
  <xs:element name="shout" type="xs:string" substitutionGroup="po:remark"/>

  <xs:element name="notes">
    <xs:complexType>
      <xs:sequence>
        <xs:element ref="po:remark" maxOccurs="unbounded"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>

  <xs:element name="wrapper">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="only" type="xs:int"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>
"#;

/// Qualified name in the purchase order namespace
pub fn po(local_name: &str) -> QName {
    QName::namespaced(PO_NAMESPACE, local_name)
}

/// Freshly parsed purchase order schema
pub fn po_schema() -> Arc<SchemaDocument> {
    Arc::new(parse_schema(PO_XSD, None).expect("fixture schema parses"))
}

/// Configuration binding the purchase order schema with the xs bindings
pub fn po_configuration() -> Configuration {
    Configuration::new(PO_NAMESPACE).with_schema(po_schema())
}

/// Lenient parser over a configuration
pub fn parser_for(configuration: Configuration) -> Parser {
    Parser::new(configuration)
}

/// Parser over a configuration with options
pub fn parser_with(configuration: Configuration, options: ParserOptions) -> Parser {
    Parser::with_options(vec![Arc::new(configuration)], options)
}

/// Encoder over a configuration writing `po` prefixes and no declaration
pub fn encoder_for(configuration: Configuration) -> Encoder {
    Encoder::with_options(
        vec![Arc::new(configuration)],
        EncoderOptions::new()
            .with_namespace("po", PO_NAMESPACE)
            .with_xml_declaration(false),
    )
}

/// Shared record of which bindings ran
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call
    pub fn push(&self, entry: &str) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(entry.to_string());
    }

    /// Calls recorded so far
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Simple binding that records its parse calls and passes values through
pub struct Tracer {
    pub target: QName,
    pub label: &'static str,
    pub mode: ExecutionMode,
    pub log: CallLog,
}

impl Tracer {
    /// Create a tracer binding wrapped for registration
    pub fn binding(target: QName, label: &'static str, mode: ExecutionMode, log: &CallLog) -> Binding {
        Binding::simple(Tracer {
            target,
            label,
            mode,
            log: log.clone(),
        })
    }
}

impl SimpleBinding for Tracer {
    fn target(&self) -> QName {
        self.target.clone()
    }

    fn value_type(&self) -> Option<ValueType> {
        None
    }

    fn execution_mode(&self) -> ExecutionMode {
        self.mode
    }

    fn parse(&self, _instance: &InstanceComponent, value: Value) -> Result<Value> {
        self.log.push(self.label);
        Ok(value)
    }

    fn encode(&self, object: &Value, _value: &str) -> Result<String> {
        Ok(object.lexical().unwrap_or_default())
    }
}
