// This file is part of gatehouse.
//
// gatehouse is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// gatehouse is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Null-terminated ASCII framing and the client/server message catalogue.
//!
//! A record on the wire is `<id><body>\x00`, with an optional `\n` tolerated
//! just before the terminator. `id` is the longest registered prefix of the
//! catalogue for that direction; everything after it is the body.

pub mod catalogue;
pub mod framing;
pub mod message;

pub use catalogue::{ClientMessageId, ServerMessageId};
pub use message::{ClientMessage, ServerMessage};
