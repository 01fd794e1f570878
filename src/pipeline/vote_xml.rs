// Reader for the per-roll-call XML files.
//
// The root element carries the chamber ("where"), session and roll number;
// each <voter> child carries a voter id and a one-character vote code.

use log::{debug, warn};

use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Reader;

use vote_clustering::RollCall;

use crate::pipeline::*;

/// Parses one roll-call document and returns the vote id (of the form
/// `h-<session>.<roll>` or `s-<session>.<roll>`) together with the four
/// voter lists.
///
/// An unrecognized chamber value or a missing session/roll attribute is a
/// [PipelineError::MalformedVoteFile]. Unrecognized vote codes are dropped
/// silently per the data convention; voter ids that are not integers are
/// dropped with a warning.
pub fn parse_roll_call(xml: &str, path: &str) -> PipelineResult<(String, RollCall)> {
    let mut reader = Reader::from_str(xml);
    let mut vote_id: Option<String> = None;
    let mut roll_call = RollCall::default();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if vote_id.is_none() {
                    // The first element is the document root with the
                    // roll-call metadata.
                    vote_id = Some(vote_id_from_root(e, path)?);
                } else if e.name().as_ref() == b"voter" {
                    read_voter(e, &mut roll_call, path);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(e).context(XmlParseSnafu { path }),
        }
    }
    match vote_id {
        Some(id) => Ok((id, roll_call)),
        None => MalformedVoteFileSnafu {
            path,
            reason: "no root element",
        }
        .fail(),
    }
}

fn vote_id_from_root(e: &BytesStart, path: &str) -> PipelineResult<String> {
    let chamber = attr_value(e, b"where").context(MalformedVoteFileSnafu {
        path,
        reason: "missing \"where\" attribute",
    })?;
    let prefix = match chamber.as_str() {
        "house" => 'h',
        "senate" => 's',
        other => {
            return MalformedVoteFileSnafu {
                path,
                reason: format!("unrecognized chamber {:?}", other),
            }
            .fail()
        }
    };
    let session = attr_value(e, b"session").context(MalformedVoteFileSnafu {
        path,
        reason: "missing \"session\" attribute",
    })?;
    let roll = attr_value(e, b"roll").context(MalformedVoteFileSnafu {
        path,
        reason: "missing \"roll\" attribute",
    })?;
    Ok(format!("{}-{}.{}", prefix, session, roll))
}

fn read_voter(e: &BytesStart, roll_call: &mut RollCall, path: &str) {
    let (id_s, code) = match (attr_value(e, b"id"), attr_value(e, b"vote")) {
        (Some(id_s), Some(code)) => (id_s, code),
        _ => {
            warn!("{}: voter element without id or vote attribute", path);
            return;
        }
    };
    let voter_id = match id_s.parse::<u32>() {
        Ok(voter_id) => voter_id,
        Err(_) => {
            warn!("{}: voter id {:?} is not an integer, dropping entry", path, id_s);
            return;
        }
    };
    match code.as_str() {
        "+" => roll_call.yeas.push(voter_id),
        "-" => roll_call.nays.push(voter_id),
        "0" => roll_call.not_voting.push(voter_id),
        "P" => roll_call.present.push(voter_id),
        other => debug!(
            "{}: dropping unrecognized vote code {:?} for voter {}",
            path, other, voter_id
        ),
    }
}

fn attr_value(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}
