#[cfg(test)]
mod test {
    use a2lcore::*;
    use tempfile::tempdir;

    static XCP_A2ML: &str = r#"
        /begin A2ML
            enum TimeUnit {
                "UNIT_1NS" = 0, "UNIT_10NS" = 1, "UNIT_100NS", "UNIT_1US" = 30,
                "UNIT_10US" = 4, "UNIT_100US" = 5, "UNIT_1MS" = 6, "UNIT_10MS" = 7,
                "UNIT_100MS" = 8, "UNIT_1S" = 9
            };
            enum Parity { "PARITY_NONE", "PARITY_ODD", "PARITY_EVEN" };
            enum Checksum { "NO_CHECKSUM" = 10, "CHECKSUM_BYTE", "CHECKSUM_WORD" };
            taggedstruct Common {
                "TIME_UNIT" enum TimeUnit;
                ("DAQ_EVENT" uint)*;
                "MAX_DTO" uint;
            };
            struct Event {
                char[101];
                taggedstruct Common;
            };
            block "IF_DATA" taggedunion if_data {
                "XCP" taggedstruct {
                    (block "EVENT" struct Event)*;
                    "PARITY" enum Parity;
                    "CHECKSUM" enum Checksum;
                };
            };
        /end A2ML
    "#;

    fn schema_enum<'a>(schema: &'a AmlSchema, name: &str) -> &'a Enumeration {
        let Some(AmlType::Enumeration(enumeration)) =
            schema.registry.get(Category::Enumeration, name)
        else {
            panic!("enum {name} is missing");
        };
        enumeration
    }

    #[test]
    fn enum_renumbering() {
        let (document, log_msgs) = load_from_string(XCP_A2ML, &LoadOptions::default()).unwrap();
        assert!(log_msgs.is_empty());
        let schema = document.file_schema.as_ref().unwrap();

        let time_unit = schema_enum(schema, "TimeUnit");
        assert_eq!(time_unit.value("UNIT_1NS"), Some(0));
        assert_eq!(time_unit.value("UNIT_10NS"), Some(1));
        assert_eq!(time_unit.value("UNIT_100NS"), Some(2));
        assert_eq!(time_unit.value("UNIT_1US"), Some(30));
        assert_eq!(time_unit.value("UNIT_10US"), Some(4));
        assert_eq!(time_unit.value("UNIT_1S"), Some(9));

        let parity = schema_enum(schema, "Parity");
        let values: Vec<i64> = parity.enumerators.iter().map(|e| e.value).collect();
        assert_eq!(values, vec![0, 1, 2]);

        let checksum = schema_enum(schema, "Checksum");
        assert_eq!(checksum.value("NO_CHECKSUM"), Some(10));
        assert_eq!(checksum.value("CHECKSUM_BYTE"), Some(11));
        assert_eq!(checksum.value("CHECKSUM_WORD"), Some(12));
    }

    #[test]
    fn referrer_round_trip() {
        let text = format!(
            "{XCP_A2ML}\n/begin IF_DATA XCP\n  /begin EVENT \"fast\" TIME_UNIT UNIT_1MS DAQ_EVENT 1 DAQ_EVENT 2 DAQ_EVENT 3 MAX_DTO 8 MAX_DTO 16 /end EVENT\n  PARITY PARITY_ODD\n/end IF_DATA\n"
        );
        let (document, _) = load_from_string(&text, &LoadOptions::default()).unwrap();
        let results = document.interpret_all();
        assert_eq!(results.len(), 1);
        let value = results[0].1.as_ref().unwrap();

        let xcp = value.inner().inner();
        let event = xcp.get_tagged("EVENT").unwrap().values()[0].inner();
        let event_items = event.items().unwrap();
        assert_eq!(event_items[0].as_str(), Some("fast"));

        // the referenced taggedstruct Common provides the tags of the event
        let common = &event_items[1];
        assert_eq!(
            common.get_tagged("TIME_UNIT").unwrap().last().unwrap().as_str(),
            Some("UNIT_1MS")
        );
        let daq_events: Vec<i64> = common
            .get_tagged("DAQ_EVENT")
            .unwrap()
            .values()
            .iter()
            .filter_map(IfDataValue::as_i64)
            .collect();
        assert_eq!(daq_events, vec![1, 2, 3]);
        let TaggedValue::Single(max_dto) = common.get_tagged("MAX_DTO").unwrap() else {
            panic!("MAX_DTO is not repeatable");
        };
        assert_eq!(max_dto.as_i64(), Some(16));

        assert_eq!(
            xcp.get_tagged("PARITY").unwrap().last().unwrap().as_str(),
            Some("PARITY_ODD")
        );
    }

    #[test]
    fn strict_enums() {
        let text = format!("{XCP_A2ML}\n/begin IF_DATA XCP PARITY PARITY_MARK /end IF_DATA\n");
        let (document, _) = load_from_string(&text, &LoadOptions::default()).unwrap();
        assert!(document.interpret_all()[0].1.is_ok());

        let options = LoadOptions::new().with_strict_enums(true);
        let (document, _) = load_from_string(&text, &options).unwrap();
        let results = document.interpret_all();
        assert!(matches!(
            &results[0].1,
            Err(IfDataError::InvalidEnumValue { enumtxt, .. }) if enumtxt == "PARITY_MARK"
        ));
    }

    #[test]
    fn includes_and_error_positions() {
        let dir = tempdir().unwrap();
        let main = dir.path().join("main.a2l");
        let inc_dir = dir.path().join("inc");
        std::fs::create_dir(&inc_dir).unwrap();
        let a2ml = inc_dir.join("xcp.aml");
        let events = inc_dir.join("events.a2l");

        std::fs::write(&a2ml, XCP_A2ML).unwrap();
        std::fs::write(
            &events,
            "/* events */\n/begin IF_DATA XCP\n  PARITY PARITY_NONE\n  CHECKSUM 7\n/end IF_DATA\n",
        )
        .unwrap();
        std::fs::write(
            &main,
            "/begin PROJECT p \"\"\n/include \"xcp.aml\"\n/include events.a2l\n/end PROJECT\n",
        )
        .unwrap();

        // the included files are only found through the search path
        let result = load(&main, &LoadOptions::default());
        assert!(matches!(
            result,
            Err(A2lError::PreprocessorError {
                preprocessor_error: PreprocessorError::IncludeNotFound { line: 2, .. }
            })
        ));

        let options = LoadOptions::new().with_include_paths(vec![inc_dir.clone()]);
        let (document, log_msgs) = load(&main, &options).unwrap();
        assert!(log_msgs.is_empty());
        assert!(document.file_schema.is_some());

        let section = document.if_data.iter().next().unwrap();
        let error = document.interpret_if_data(section).unwrap_err();
        let events_name = events.canonicalize().unwrap().to_string_lossy().to_string();
        let IfDataError::UnexpectedToken { filename, line, .. } = &error else {
            panic!("expected UnexpectedToken, got {error}");
        };
        assert_eq!(filename, &events_name);
        assert_eq!(*line, 4);

        // every line of the main stream can be traced back to its file
        let main_name = main.canonicalize().unwrap().to_string_lossy().to_string();
        let last_line = document.line_map.last_line();
        assert_eq!(last_line as usize, document.text.lines().count());
        assert_eq!(document.line_map.lookup(1).unwrap(), (main_name.as_str(), 1));
        assert_eq!(
            document.line_map.lookup(last_line).unwrap(),
            (main_name.as_str(), 4)
        );
    }

    #[test]
    fn circular_include() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("first.a2l");
        let second = dir.path().join("second.a2l");
        std::fs::write(&first, "/include \"second.a2l\"\n").unwrap();
        std::fs::write(&second, "x\n/include \"first.a2l\"\n").unwrap();

        let result = load(&first, &LoadOptions::default());
        assert!(matches!(
            result,
            Err(A2lError::PreprocessorError {
                preprocessor_error: PreprocessorError::CircularInclude { line: 2, .. }
            })
        ));
    }

    #[test]
    fn encoding() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin1.a2l");
        std::fs::write(&path, b"/begin PROJECT p \"\xe4\" /end PROJECT\n").unwrap();

        let (document, _) = load(&path, &LoadOptions::default()).unwrap();
        assert!(document.text.contains('\u{e4}'));

        let options = LoadOptions::new().with_encoding(Encoding::Utf8);
        let result = load(&path, &options);
        assert!(matches!(
            result,
            Err(A2lError::EncodingError { position: 18, .. })
        ));
    }

    #[test]
    fn parallel_interpretation() {
        let mut text = String::from(XCP_A2ML);
        for idx in 0..16 {
            text.push_str(&format!(
                "/begin IF_DATA XCP /begin EVENT \"ev{idx}\" MAX_DTO {idx} /end EVENT /end IF_DATA\n"
            ));
        }
        let (document, _) = load_from_string(&text, &LoadOptions::default()).unwrap();
        let schema = document.file_schema.as_ref().unwrap();
        let interpreter = IfDataInterpreter::new(schema).with_line_map(&document.line_map);
        let sections: Vec<&IfDataSection> = document.if_data.iter().collect();

        let mut values: Vec<i64> = std::thread::scope(|scope| {
            let handles: Vec<_> = sections
                .chunks(4)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|section| {
                                let value = interpreter.parse_section(section).unwrap();
                                let event = value.inner().inner().get_tagged("EVENT").unwrap();
                                let common = &event.values()[0].inner().items().unwrap()[1];
                                common
                                    .get_tagged("MAX_DTO")
                                    .and_then(TaggedValue::last)
                                    .and_then(IfDataValue::as_i64)
                                    .unwrap()
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| handle.join().unwrap())
                .collect()
        });
        values.sort_unstable();
        assert_eq!(values, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn sections_by_position() {
        let text = "/begin MEASUREMENT a \"\" /begin IF_DATA XCP PARITY PARITY_NONE /end IF_DATA /end MEASUREMENT\n/begin MEASUREMENT b \"\"\n  /begin IF_DATA XCP\n  /end IF_DATA\n/end MEASUREMENT\n";
        let (document, _) = load_from_string(text, &LoadOptions::default()).unwrap();
        assert_eq!(document.if_data.len(), 2);

        let first = document.if_data.section_at(1, 30).unwrap();
        assert_eq!(first.text, "/begin IF_DATA XCP PARITY PARITY_NONE /end IF_DATA");
        assert!(document.text.lines().next().unwrap().ends_with("/end MEASUREMENT"));
        assert_eq!(
            document.text.lines().next().unwrap().len(),
            text.lines().next().unwrap().len()
        );

        let second: Vec<&IfDataSection> = document.if_data.in_lines(2, 5).collect();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].span.start, TextPosition { line: 3, column: 2 });
    }
}
