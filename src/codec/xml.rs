//! GraphML text rendering and parsing (quick-xml)
//!
//! Elements the model interprets become typed children. Anything else under
//! a modelled element (`desc`, `default`, keyless `data`, comments, graphs
//! on edges) is kept as compact markup in that element's layout and written
//! back where it was found. `<data>` holding child elements keeps them as
//! markup too.

use super::{DecodeError, RenderError};
use crate::graph::layout::is_canonical;
use crate::graph::{
    DataEntry, DataType, Document, Edge, Graph, KeyScope, Node, SchemaKey, Slot,
};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashSet;
use std::io::Write;
use tracing::{debug, warn};

/// Spaces per indentation level
pub const INDENT: usize = 4;

const ROOT_TAG: &str = "graphml";

/// Child kinds in the order they are written when no layout says otherwise
const CANONICAL: [Slot; 5] = [Slot::Data, Slot::Key, Slot::Node, Slot::Edge, Slot::Graph];

fn is_blank(text: &BytesText<'_>) -> bool {
    text.iter().all(u8::is_ascii_whitespace)
}

// ==================== Rendering ====================

struct XmlOut<W: Write> {
    inner: Writer<W>,
}

impl<W: Write> XmlOut<W> {
    fn emit(&mut self, event: Event<'_>) -> Result<(), RenderError> {
        self.inner
            .write_event(event)
            .map_err(|e| RenderError::Xml(e.to_string()))
    }

    fn start(&mut self, tag: &str, attrs: &[(&str, &str)]) -> Result<(), RenderError> {
        self.emit(Event::Start(element(tag, attrs)))
    }

    fn empty(&mut self, tag: &str, attrs: &[(&str, &str)]) -> Result<(), RenderError> {
        self.emit(Event::Empty(element(tag, attrs)))
    }

    fn end(&mut self, tag: &str) -> Result<(), RenderError> {
        self.emit(Event::End(BytesEnd::new(tag)))
    }

    /// Re-emit kept markup through the indenting writer
    fn raw(&mut self, xml: &str) -> Result<(), RenderError> {
        let mut reader = Reader::from_str(xml);
        loop {
            match reader
                .read_event()
                .map_err(|e| RenderError::Xml(e.to_string()))?
            {
                Event::Eof => return Ok(()),
                Event::Text(t) if is_blank(&t) => {}
                event => self.emit(event)?,
            }
        }
    }
}

fn element<'a>(tag: &'a str, attrs: &[(&'a str, &'a str)]) -> BytesStart<'a> {
    let mut start = BytesStart::new(tag);
    for attr in attrs {
        start.push_attribute(*attr);
    }
    start
}

fn borrowed(attrs: &[(String, String)]) -> Vec<(&str, &str)> {
    attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
}

/// Walk a layout, asking `next` to write the next child of each slot kind.
///
/// Children without a slot follow the layout, ahead of any nested graph.
fn write_layout<W, F>(
    out: &mut XmlOut<W>,
    layout: &[Slot],
    mut next: F,
) -> Result<(), RenderError>
where
    W: Write,
    F: FnMut(&mut XmlOut<W>, &Slot) -> Result<bool, RenderError>,
{
    for slot in layout {
        match slot {
            Slot::Raw(xml) => out.raw(xml)?,
            Slot::Graph => {
                write_rest(out, &mut next, &CANONICAL[..4])?;
                next(out, slot)?;
            }
            kind => {
                next(out, kind)?;
            }
        }
    }
    write_rest(out, &mut next, &CANONICAL)
}

fn write_rest<W, F>(
    out: &mut XmlOut<W>,
    next: &mut F,
    kinds: &[Slot],
) -> Result<(), RenderError>
where
    W: Write,
    F: FnMut(&mut XmlOut<W>, &Slot) -> Result<bool, RenderError>,
{
    for kind in kinds {
        while next(out, kind)? {}
    }
    Ok(())
}

/// Write the next item, returning false once `items` is exhausted
fn write_next<'a, W, T, I, F>(
    out: &mut XmlOut<W>,
    items: &mut I,
    write: F,
) -> Result<bool, RenderError>
where
    W: Write,
    T: 'a + ?Sized,
    I: Iterator<Item = &'a T>,
    F: FnOnce(&mut XmlOut<W>, &'a T) -> Result<(), RenderError>,
{
    match items.next() {
        Some(item) => write(out, item).map(|()| true),
        None => Ok(false),
    }
}

/// Render a document as indented GraphML text, in document order
pub fn render(doc: &Document) -> Result<String, RenderError> {
    let mut out = XmlOut {
        inner: Writer::new_with_indent(Vec::new(), b' ', INDENT),
    };

    out.emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("no"))))?;
    out.start(ROOT_TAG, &borrowed(&doc.root_attributes))?;

    let mut keys = doc.keys.iter();
    let mut graph = std::iter::once(&doc.graph);
    write_layout(&mut out, &doc.layout, |out, slot| match slot {
        Slot::Key => write_next(out, &mut keys, render_key),
        Slot::Graph => write_next(out, &mut graph, render_graph),
        _ => Ok(false),
    })?;
    out.end(ROOT_TAG)?;

    let mut bytes = out.inner.into_inner();
    bytes.push(b'\n');
    Ok(String::from_utf8(bytes)?)
}

fn render_key<W: Write>(out: &mut XmlOut<W>, key: &SchemaKey) -> Result<(), RenderError> {
    let mut attrs = vec![
        ("id", key.id.as_str()),
        ("attr.name", key.display_name.as_str()),
        ("attr.type", key.data_type.as_str()),
    ];
    if let Some(scope) = key.scope {
        attrs.push(("for", scope.as_str()));
    }
    attrs.extend(borrowed(&key.attributes));
    if key.layout.is_empty() {
        return out.empty("key", &attrs);
    }

    out.start("key", &attrs)?;
    write_layout(out, &key.layout, |_, _| Ok(false))?;
    out.end("key")
}

fn render_data<W: Write>(out: &mut XmlOut<W>, entry: &DataEntry) -> Result<(), RenderError> {
    let attrs = [("key", entry.key.as_str())];
    match &entry.markup {
        Some(markup) => {
            out.start("data", &attrs)?;
            out.raw(markup)?;
            out.end("data")
        }
        None if entry.value.is_empty() => out.empty("data", &attrs),
        None => {
            out.start("data", &attrs)?;
            out.emit(Event::Text(BytesText::new(&entry.value)))?;
            out.end("data")
        }
    }
}

fn render_graph<W: Write>(out: &mut XmlOut<W>, graph: &Graph) -> Result<(), RenderError> {
    let attrs = borrowed(&graph.attributes);
    if graph.data.is_empty()
        && graph.nodes.is_empty()
        && graph.edges.is_empty()
        && graph.layout.is_empty()
    {
        return out.empty("graph", &attrs);
    }

    out.start("graph", &attrs)?;
    let mut data = graph.data.iter();
    let mut nodes = graph.nodes.iter();
    let mut edges = graph.edges.iter();
    write_layout(out, &graph.layout, |out, slot| match slot {
        Slot::Data => write_next(out, &mut data, render_data),
        Slot::Node => write_next(out, &mut nodes, render_node),
        Slot::Edge => write_next(out, &mut edges, render_edge),
        _ => Ok(false),
    })?;
    out.end("graph")
}

fn render_node<W: Write>(out: &mut XmlOut<W>, node: &Node) -> Result<(), RenderError> {
    let mut attrs = vec![("id", node.id.as_str())];
    attrs.extend(borrowed(&node.attributes));
    if node.data.is_empty() && node.subgraph.is_none() && node.layout.is_empty() {
        return out.empty("node", &attrs);
    }

    out.start("node", &attrs)?;
    let mut data = node.data.iter();
    let mut subgraph = node.subgraph.as_deref().into_iter();
    write_layout(out, &node.layout, |out, slot| match slot {
        Slot::Data => write_next(out, &mut data, render_data),
        Slot::Graph => write_next(out, &mut subgraph, render_graph),
        _ => Ok(false),
    })?;
    out.end("node")
}

fn render_edge<W: Write>(out: &mut XmlOut<W>, edge: &Edge) -> Result<(), RenderError> {
    let mut attrs = Vec::with_capacity(3 + edge.attributes.len());
    if let Some(id) = &edge.id {
        attrs.push(("id", id.as_str()));
    }
    attrs.push(("source", edge.source.as_str()));
    attrs.push(("target", edge.target.as_str()));
    attrs.extend(borrowed(&edge.attributes));
    if edge.data.is_empty() && edge.layout.is_empty() {
        return out.empty("edge", &attrs);
    }

    out.start("edge", &attrs)?;
    let mut data = edge.data.iter();
    write_layout(out, &edge.layout, |out, slot| match slot {
        Slot::Data => write_next(out, &mut data, render_data),
        _ => Ok(false),
    })?;
    out.end("edge")
}

// ==================== Parsing ====================

/// Where the parser currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Root,
    Graph,
    Node,
    Edge,
    Key,
    /// `<data>` child of the frame below it
    Data,
}

#[derive(Default)]
struct PendingData {
    key: String,
    /// All text, as written
    text: String,
    /// Non-blank text runs, nested ones included
    runs: String,
    /// Inner markup, collected in case child elements show up
    markup: String,
    structured: bool,
}

/// Markup being copied verbatim
struct Capture {
    out: Writer<Vec<u8>>,
    depth: usize,
}

struct Parser {
    doc: Document,
    stack: Vec<Frame>,
    /// Open `<graph>` elements, innermost last
    graphs: Vec<Graph>,
    saw_root: bool,
    saw_graph: bool,
    node_ids: HashSet<String>,
    key_ids: HashSet<String>,
    pending: Option<PendingData>,
    capture: Option<Capture>,
}

/// Parse GraphML text into a document
pub fn parse(text: &str) -> Result<Document, DecodeError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = Reader::from_str(text);
    let mut parser = Parser {
        doc: Document {
            root_attributes: Vec::new(),
            keys: Vec::new(),
            graph: Graph::new(),
            layout: Vec::new(),
        },
        stack: Vec::new(),
        graphs: Vec::new(),
        saw_root: false,
        saw_graph: false,
        node_ids: HashSet::new(),
        key_ids: HashSet::new(),
        pending: None,
        capture: None,
    };

    loop {
        let event = reader
            .read_event()
            .map_err(|e| DecodeError::Xml(format!("at byte {}: {}", reader.buffer_position(), e)))?;
        if matches!(event, Event::Eof) {
            break;
        }
        parser.handle(event)?;
    }

    if !parser.stack.is_empty() || parser.capture.is_some() {
        return Err(DecodeError::Xml("unexpected end of document".to_string()));
    }
    if !parser.saw_graph {
        return Err(DecodeError::MissingGraph);
    }
    normalize(&mut parser.doc.layout);

    debug!(
        "Parsed network: {} keys, {} nodes, {} edges",
        parser.doc.keys.len(),
        parser.doc.node_count(),
        parser.doc.graph.edges.len()
    );
    Ok(parser.doc)
}

fn attributes(e: &BytesStart<'_>) -> Result<Vec<(String, String)>, DecodeError> {
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| DecodeError::Xml(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| DecodeError::Xml(err.to_string()))?
            .into_owned();
        attrs.push((key, value));
    }
    Ok(attrs)
}

fn take_attr(attrs: &mut Vec<(String, String)>, name: &str) -> Option<String> {
    let idx = attrs.iter().position(|(k, _)| k == name)?;
    Some(attrs.remove(idx).1)
}

fn require_attr(
    attrs: &mut Vec<(String, String)>,
    element: &'static str,
    attribute: &'static str,
) -> Result<String, DecodeError> {
    take_attr(attrs, attribute).ok_or(DecodeError::MissingAttribute { element, attribute })
}

/// Drop a layout that matches the canonical order
fn normalize(layout: &mut Vec<Slot>) {
    if is_canonical(layout) {
        layout.clear();
    }
}

fn unescaped(text: &BytesText<'_>) -> Result<String, DecodeError> {
    text.unescape()
        .map(|t| t.into_owned())
        .map_err(|e| DecodeError::Xml(e.to_string()))
}

impl Parser {
    fn top(&self) -> Option<Frame> {
        self.stack.last().copied()
    }

    fn handle(&mut self, event: Event<'_>) -> Result<(), DecodeError> {
        if self.capture.is_some() {
            return self.capture_event(event);
        }
        let Some(top) = self.top() else {
            return match event {
                Event::Start(e) => self.open(e, false),
                Event::Empty(e) => self.open(e, true),
                // Declarations and comments around the document element
                _ => Ok(()),
            };
        };

        match event {
            Event::Start(e) => self.open(e, false),
            Event::Empty(e) => self.open(e, true),
            Event::End(_) => {
                if let Some(frame) = self.stack.pop() {
                    self.close(frame)?;
                }
                Ok(())
            }
            Event::Text(t) if top == Frame::Data => {
                let value = unescaped(&t)?;
                if let Some(pending) = self.pending.as_mut() {
                    if !is_blank(&t) {
                        pending.runs.push_str(&value);
                        pending.markup.push_str(&String::from_utf8_lossy(&t));
                    }
                    pending.text.push_str(&value);
                }
                Ok(())
            }
            Event::CData(c) if top == Frame::Data => {
                if let Some(pending) = self.pending.as_mut() {
                    let value = String::from_utf8_lossy(&c);
                    pending.runs.push_str(&value);
                    pending.markup.push_str(&format!("<![CDATA[{}]]>", value));
                    pending.text.push_str(&value);
                }
                Ok(())
            }
            Event::Text(t) if is_blank(&t) => Ok(()),
            event @ (Event::Text(_) | Event::CData(_) | Event::Comment(_) | Event::PI(_)) => {
                debug!("Keeping {:?} inside {:?} as raw markup", event, top);
                self.begin_capture(event)
            }
            _ => Ok(()),
        }
    }

    /// Handle an opening tag
    fn open(&mut self, e: BytesStart<'_>, empty: bool) -> Result<(), DecodeError> {
        let name = e.name().as_ref().to_vec();

        let Some(parent) = self.top() else {
            if self.saw_root {
                return Err(DecodeError::Xml("multiple root elements".to_string()));
            }
            self.saw_root = true;
            let frame = if name == b"graph" {
                // Bare <graph> document without a <graphml> wrapper
                self.open_graph(&e)?
            } else {
                self.doc.root_attributes = attributes(&e)?;
                Frame::Root
            };
            return self.enter(frame, empty);
        };

        let frame = match (parent, name.as_slice()) {
            (Frame::Root, b"graph") if !self.saw_graph => Some(self.open_graph(&e)?),
            (Frame::Root, b"key") => Some(self.open_key(&e)?),
            (Frame::Graph, b"node") => Some(self.open_node(&e)?),
            (Frame::Graph, b"edge") => Some(self.open_edge(&e)?),
            (Frame::Graph | Frame::Node | Frame::Edge, b"data") => self.open_data(&e)?,
            (Frame::Node, b"graph") if !self.node_has_subgraph() => Some(self.open_graph(&e)?),
            (Frame::Data, _) => None,
            (_, b"graph") => {
                warn!(
                    "Keeping <graph> inside {:?} as raw markup; its nodes are not annotated",
                    parent
                );
                None
            }
            _ => {
                debug!(
                    "Keeping <{}> inside {:?} as raw markup",
                    String::from_utf8_lossy(&name),
                    parent
                );
                None
            }
        };

        match frame {
            Some(frame) => self.enter(frame, empty),
            None if empty => self.begin_capture(Event::Empty(e)),
            None => self.begin_capture(Event::Start(e)),
        }
    }

    fn enter(&mut self, frame: Frame, empty: bool) -> Result<(), DecodeError> {
        if empty {
            self.close(frame)
        } else {
            self.stack.push(frame);
            Ok(())
        }
    }

    fn graph_mut(&mut self) -> Result<&mut Graph, DecodeError> {
        self.graphs
            .last_mut()
            .ok_or_else(|| DecodeError::Xml("element outside <graph>".to_string()))
    }

    fn node_has_subgraph(&self) -> bool {
        self.graphs
            .last()
            .and_then(|g| g.nodes.last())
            .is_some_and(|n| n.subgraph.is_some())
    }

    fn open_graph(&mut self, e: &BytesStart<'_>) -> Result<Frame, DecodeError> {
        let graph = Graph {
            attributes: attributes(e)?,
            ..Graph::default()
        };
        match self.top() {
            Some(Frame::Root) => self.doc.layout.push(Slot::Graph),
            Some(Frame::Node) => {
                if let Some(node) = self.graph_mut()?.nodes.last_mut() {
                    node.layout.push(Slot::Graph);
                }
            }
            _ => {}
        }
        self.saw_graph = true;
        self.graphs.push(graph);
        Ok(Frame::Graph)
    }

    fn open_node(&mut self, e: &BytesStart<'_>) -> Result<Frame, DecodeError> {
        let mut attrs = attributes(e)?;
        let id = require_attr(&mut attrs, "node", "id")?;
        if !self.node_ids.insert(id.clone()) {
            return Err(DecodeError::DuplicateNode(id));
        }
        let mut node = Node::new(&id);
        node.attributes = attrs;

        let graph = self.graph_mut()?;
        graph.nodes.push(node);
        graph.layout.push(Slot::Node);
        Ok(Frame::Node)
    }

    fn open_edge(&mut self, e: &BytesStart<'_>) -> Result<Frame, DecodeError> {
        let mut attrs = attributes(e)?;
        let id = take_attr(&mut attrs, "id");
        let source = require_attr(&mut attrs, "edge", "source")?;
        let target = require_attr(&mut attrs, "edge", "target")?;

        let graph = self.graph_mut()?;
        graph.edges.push(Edge {
            id,
            source,
            target,
            attributes: attrs,
            data: Vec::new(),
            layout: Vec::new(),
        });
        graph.layout.push(Slot::Edge);
        Ok(Frame::Edge)
    }

    fn open_key(&mut self, e: &BytesStart<'_>) -> Result<Frame, DecodeError> {
        let mut attrs = attributes(e)?;
        let id = require_attr(&mut attrs, "key", "id")?;
        let display_name = take_attr(&mut attrs, "attr.name").unwrap_or_else(|| id.clone());
        let data_type = match take_attr(&mut attrs, "attr.type") {
            Some(t) => t.parse::<DataType>()?,
            None => DataType::String,
        };
        let scope = take_attr(&mut attrs, "for").and_then(|s| match s.parse::<KeyScope>() {
            Ok(scope) => Some(scope),
            Err(e) => {
                warn!("Key '{}': {}", id, e);
                None
            }
        });

        if !self.key_ids.insert(id.clone()) {
            warn!("Duplicate schema key '{}'", id);
        }
        self.doc.keys.push(SchemaKey {
            id,
            display_name,
            data_type,
            scope,
            attributes: attrs,
            layout: Vec::new(),
        });
        self.doc.layout.push(Slot::Key);
        Ok(Frame::Key)
    }

    /// Start a `<data>` entry, or return `None` when it has no key
    fn open_data(&mut self, e: &BytesStart<'_>) -> Result<Option<Frame>, DecodeError> {
        let mut attrs = attributes(e)?;
        let Some(key) = take_attr(&mut attrs, "key") else {
            warn!("Keeping <data> without a key as raw markup");
            return Ok(None);
        };
        if !attrs.is_empty() {
            let names: Vec<&str> = attrs.iter().map(|(k, _)| k.as_str()).collect();
            warn!("Dropping attributes {:?} of <data key=\"{}\">", names, key);
        }
        self.pending = Some(PendingData {
            key,
            ..PendingData::default()
        });
        Ok(Some(Frame::Data))
    }

    /// Layout of the innermost open modelled element
    fn layout_mut(&mut self) -> Option<&mut Vec<Slot>> {
        match self.top()? {
            Frame::Root => Some(&mut self.doc.layout),
            Frame::Graph => self.graphs.last_mut().map(|g| &mut g.layout),
            Frame::Node => self.graphs.last_mut()?.nodes.last_mut().map(|n| &mut n.layout),
            Frame::Edge => self.graphs.last_mut()?.edges.last_mut().map(|e| &mut e.layout),
            Frame::Key => self.doc.keys.last_mut().map(|k| &mut k.layout),
            Frame::Data => None,
        }
    }

    fn begin_capture(&mut self, event: Event<'_>) -> Result<(), DecodeError> {
        self.capture = Some(Capture {
            out: Writer::new(Vec::new()),
            depth: 0,
        });
        self.capture_event(event)
    }

    fn capture_event(&mut self, event: Event<'_>) -> Result<(), DecodeError> {
        if let Event::Text(t) = &event {
            if is_blank(t) {
                return Ok(());
            }
        }
        if self.top() == Some(Frame::Data) {
            let run = match &event {
                Event::Text(t) => Some(unescaped(t)?),
                Event::CData(c) => Some(String::from_utf8_lossy(c).into_owned()),
                _ => None,
            };
            if let (Some(run), Some(pending)) = (run, self.pending.as_mut()) {
                pending.runs.push_str(&run);
            }
        }

        let Some(capture) = self.capture.as_mut() else {
            return Ok(());
        };
        match &event {
            Event::Start(_) => capture.depth += 1,
            Event::End(_) => capture.depth = capture.depth.saturating_sub(1),
            _ => {}
        }
        capture
            .out
            .write_event(event)
            .map_err(|e| DecodeError::Xml(e.to_string()))?;
        if capture.depth == 0 {
            self.finish_capture()?;
        }
        Ok(())
    }

    fn finish_capture(&mut self) -> Result<(), DecodeError> {
        let Some(capture) = self.capture.take() else {
            return Ok(());
        };
        let fragment = String::from_utf8(capture.out.into_inner())
            .map_err(|e| DecodeError::Xml(e.to_string()))?;

        if self.top() == Some(Frame::Data) {
            if let Some(pending) = self.pending.as_mut() {
                pending.markup.push_str(&fragment);
                pending.structured = true;
            }
            return Ok(());
        }
        match self.layout_mut() {
            Some(layout) => layout.push(Slot::Raw(fragment)),
            None => warn!("Dropping markup with no owning element: {}", fragment),
        }
        Ok(())
    }

    /// Handle the end of a frame; the parent frame is on top of the stack
    fn close(&mut self, frame: Frame) -> Result<(), DecodeError> {
        match frame {
            Frame::Data => self.close_data(),
            Frame::Graph => self.close_graph(),
            Frame::Node | Frame::Edge => {
                let graph = self.graph_mut()?;
                let layout = match frame {
                    Frame::Node => graph.nodes.last_mut().map(|n| &mut n.layout),
                    _ => graph.edges.last_mut().map(|e| &mut e.layout),
                };
                if let Some(layout) = layout {
                    normalize(layout);
                }
                Ok(())
            }
            Frame::Key => {
                if let Some(key) = self.doc.keys.last_mut() {
                    normalize(&mut key.layout);
                }
                Ok(())
            }
            Frame::Root => Ok(()),
        }
    }

    fn close_data(&mut self) -> Result<(), DecodeError> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        let entry = if pending.structured {
            DataEntry {
                key: pending.key,
                value: pending.runs,
                markup: Some(pending.markup),
            }
        } else {
            DataEntry::new(&pending.key, pending.text)
        };

        let top = self.top();
        let graph = self.graph_mut()?;
        let owner = match top {
            Some(Frame::Node) => graph.nodes.last_mut().map(|n| (&mut n.data, &mut n.layout)),
            Some(Frame::Edge) => graph.edges.last_mut().map(|e| (&mut e.data, &mut e.layout)),
            Some(Frame::Graph) => Some((&mut graph.data, &mut graph.layout)),
            _ => None,
        };
        if let Some((data, layout)) = owner {
            data.push(entry);
            layout.push(Slot::Data);
        }
        Ok(())
    }

    fn close_graph(&mut self) -> Result<(), DecodeError> {
        let Some(mut graph) = self.graphs.pop() else {
            return Ok(());
        };
        normalize(&mut graph.layout);
        if self.top() == Some(Frame::Node) {
            if let Some(node) = self.graph_mut()?.nodes.last_mut() {
                node.subgraph = Some(Box::new(graph));
            }
        } else {
            self.doc.graph = graph;
        }
        Ok(())
    }
}
