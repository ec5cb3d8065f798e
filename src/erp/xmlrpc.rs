// src/erp/xmlrpc.rs
//
// Codec XML-RPC mínimo: o suficiente para `common.authenticate` e `object.execute_kw`.

use std::collections::BTreeMap;

use quick_xml::{escape::escape, events::Event, Reader};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum XmlRpcError {
    #[error("fault {code}: {message}")]
    Fault { code: i64, message: String },

    #[error("resposta XML-RPC malformada: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Double(f64),
    String(String),
    Nil,
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Struct(members) => members.get(key),
            _ => None,
        }
    }

    /// Campo many2one do ERP: `[id, "nome"]` ou `false`.
    pub fn as_many2one(&self) -> Option<(i64, String)> {
        let pair = self.as_array()?;
        match pair {
            [id, name] => Some((id.as_i64()?, name.as_str()?.to_string())),
            _ => None,
        }
    }

    pub fn ids(&self) -> Vec<i64> {
        self.as_array()
            .map(|items| items.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default()
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

// --- Encoder ---

pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?><methodCall><methodName>");
    out.push_str(&escape(method));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        write_value(&mut out, param);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

fn write_value(out: &mut String, value: &Value) {
    out.push_str("<value>");
    match value {
        Value::Int(v) => out.push_str(&format!("<int>{}</int>", v)),
        Value::Bool(v) => out.push_str(&format!("<boolean>{}</boolean>", u8::from(*v))),
        Value::Double(v) => out.push_str(&format!("<double>{}</double>", v)),
        Value::String(v) => {
            out.push_str("<string>");
            out.push_str(&escape(v.as_str()));
            out.push_str("</string>");
        }
        Value::Nil => out.push_str("<nil/>"),
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(out, item);
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                out.push_str(&escape(name.as_str()));
                out.push_str("</name>");
                write_value(out, member);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

// --- Decoder ---

#[derive(Debug, Default)]
struct Node {
    name: String,
    text: String,
    children: Vec<Node>,
}

impl Node {
    fn named(name: &[u8]) -> Self {
        Node {
            name: String::from_utf8_lossy(name).into_owned(),
            ..Default::default()
        }
    }

    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    fn require(&self, name: &str) -> Result<&Node, XmlRpcError> {
        self.child(name)
            .ok_or_else(|| XmlRpcError::Malformed(format!("<{}> sem <{}>", self.name, name)))
    }
}

fn parse_tree(xml: &str) -> Result<Node, XmlRpcError> {
    let mut reader = Reader::from_str(xml);
    let mut stack = vec![Node::named(b"#document")];
    let malformed = |e: quick_xml::Error| XmlRpcError::Malformed(e.to_string());

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(e) => stack.push(Node::named(e.name().as_ref())),
            Event::Empty(e) => {
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::named(e.name().as_ref()));
                }
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(malformed)?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Event::CData(c) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| XmlRpcError::Malformed("tag de fechamento órfã".into()))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => return Err(XmlRpcError::Malformed("tag de fechamento órfã".into())),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(root), true) => Ok(root),
        _ => Err(XmlRpcError::Malformed("documento incompleto".into())),
    }
}

fn value_from(node: &Node) -> Result<Value, XmlRpcError> {
    // <value>texto</value> sem tipo é string
    let Some(typed) = node.children.first() else {
        return Ok(Value::String(node.text.clone()));
    };

    let text = typed.text.trim();
    let value = match typed.name.as_str() {
        "int" | "i4" | "i8" => Value::Int(
            text.parse()
                .map_err(|_| XmlRpcError::Malformed(format!("inteiro inválido: {}", text)))?,
        ),
        "boolean" => Value::Bool(text == "1"),
        "double" => Value::Double(
            text.parse()
                .map_err(|_| XmlRpcError::Malformed(format!("double inválido: {}", text)))?,
        ),
        "string" => Value::String(typed.text.clone()),
        "dateTime.iso8601" | "base64" => Value::String(text.to_string()),
        "nil" => Value::Nil,
        "array" => {
            let data = typed.require("data")?;
            let items = data
                .children
                .iter()
                .filter(|c| c.name == "value")
                .map(value_from)
                .collect::<Result<Vec<_>, _>>()?;
            Value::Array(items)
        }
        "struct" => {
            let mut members = BTreeMap::new();
            for member in typed.children.iter().filter(|c| c.name == "member") {
                let name = member.require("name")?.text.clone();
                let value = value_from(member.require("value")?)?;
                members.insert(name, value);
            }
            Value::Struct(members)
        }
        other => return Err(XmlRpcError::Malformed(format!("tipo desconhecido: {}", other))),
    };

    Ok(value)
}

/// Decodifica um `methodResponse`. Um `<fault>` vira `XmlRpcError::Fault`.
pub fn decode_response(xml: &str) -> Result<Value, XmlRpcError> {
    let root = parse_tree(xml)?;
    let response = root.require("methodResponse")?;

    if let Some(fault) = response.child("fault") {
        let detail = value_from(fault.require("value")?)?;
        return Err(XmlRpcError::Fault {
            code: detail.get("faultCode").and_then(Value::as_i64).unwrap_or_default(),
            message: detail
                .get("faultString")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }

    let param = response.require("params")?.require("param")?;
    value_from(param.require("value")?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_nested_call_with_escaping() {
        let mut kwargs = BTreeMap::new();
        kwargs.insert("limit".to_string(), Value::Int(80));

        let xml = encode_call(
            "execute_kw",
            &[
                Value::from("obra & cia"),
                Value::from(vec![Value::from(vec!["name", "ilike", "<sur>"])]),
                Value::Struct(kwargs),
                Value::Bool(true),
            ],
        );

        assert!(xml.starts_with("<?xml version=\"1.0\"?><methodCall><methodName>execute_kw</methodName>"));
        assert!(xml.contains("<string>obra &amp; cia</string>"));
        assert!(xml.contains("<string>&lt;sur&gt;</string>"));
        assert!(xml.contains("<member><name>limit</name><value><int>80</int></value></member>"));
        assert!(xml.contains("<boolean>1</boolean>"));
    }

    #[test]
    fn decodes_search_read_response() {
        let xml = r#"<?xml version='1.0'?>
<methodResponse>
  <params>
    <param>
      <value><array><data>
        <value><struct>
          <member><name>id</name><value><int>7</int></value></member>
          <member><name>name</name><value><string>Puente Norte</string></value></member>
          <member><name>company_id</name><value><array><data>
            <value><int>1</int></value><value><string>Constructora &amp; Asociados</string></value>
          </data></array></value></member>
          <member><name>partner_id</name><value><boolean>0</boolean></value></member>
        </struct></value>
      </data></array></value>
    </param>
  </params>
</methodResponse>"#;

        let value = decode_response(xml).unwrap();
        let records = value.as_array().unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("id").and_then(Value::as_i64), Some(7));
        assert_eq!(records[0].get("name").and_then(Value::as_str), Some("Puente Norte"));
        assert_eq!(
            records[0].get("company_id").and_then(Value::as_many2one),
            Some((1, "Constructora & Asociados".to_string()))
        );
        assert_eq!(records[0].get("partner_id").and_then(Value::as_many2one), None);
    }

    #[test]
    fn untyped_value_is_a_string() {
        let xml = "<methodResponse><params><param><value>hola</value></param></params></methodResponse>";
        assert_eq!(decode_response(xml).unwrap(), Value::String("hola".into()));
    }

    #[test]
    fn fault_becomes_error() {
        let xml = r#"<methodResponse><fault><value><struct>
            <member><name>faultCode</name><value><int>2</int></value></member>
            <member><name>faultString</name><value><string>Access Denied</string></value></member>
        </struct></value></fault></methodResponse>"#;

        assert_eq!(
            decode_response(xml).unwrap_err(),
            XmlRpcError::Fault {
                code: 2,
                message: "Access Denied".into()
            }
        );
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            decode_response("<html><body>502 Bad Gateway</body></html>"),
            Err(XmlRpcError::Malformed(_))
        ));
    }
}
