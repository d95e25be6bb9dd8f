/*
 * This file is part of hwselect.
 *
 * Copyright (C) 2025 hwselect contributors
 *
 * hwselect is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * hwselect is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with hwselect. If not, see <https://www.gnu.org/licenses/>.
 */

//! hwselect - pick the configuration matching the connected hardware
//!
//! Runs before the control backend starts: given candidate configurations
//! tagged with EEPROM and USB IDs, prints the first one whose hardware is
//! all present, for the calling script to consume.

pub mod cli;
pub mod logger;
pub mod selector;
