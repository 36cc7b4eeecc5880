mod keys {

  cluster_test!(keys, should_set_and_get_a_value);
  cluster_test!(keys, should_set_and_del_a_value);
  cluster_test!(keys, should_incr_and_decr_a_value);
  cluster_test!(keys, should_mset_and_mget_values);
  cluster_test_panic!(keys, should_error_mset_empty_map);
  cluster_test!(keys, should_msetnx_values);
  cluster_test!(keys, should_count_keys_across_slots);
  cluster_test!(keys, should_expire_and_persist_key);
  cluster_test!(keys, should_rename_key_with_ttl);
  cluster_test_panic!(keys, should_error_rename_missing_key);
  cluster_test!(keys, should_not_renamenx_over_existing_key);
  cluster_test!(keys, should_dump_and_restore_key);
  cluster_test!(keys, should_modify_ranges);
  cluster_test!(keys, should_getset_and_getdel_values);
}

mod hashes {

  cluster_test!(hashes, should_hset_and_hget);
  cluster_test!(hashes, should_hset_and_hdel);
  cluster_test!(hashes, should_hgetall);
  cluster_test!(hashes, should_increment_fields);
  cluster_test!(hashes, should_get_keys_values_and_lengths);
}

mod lists {

  cluster_test!(lists, should_push_and_pop_values);
  cluster_test!(lists, should_insert_and_remove_values);
  cluster_test!(lists, should_move_between_lists);
  cluster_test!(lists, should_time_out_blocking_pop);
  cluster_test!(lists, should_blpop_first_non_empty_list_across_slots);
}

mod sets {

  cluster_test!(sets, should_sadd_and_srem_elements);
  cluster_test!(sets, should_pop_and_read_random_members);
  cluster_test!(sets, should_combine_sets);
  cluster_test!(sets, should_store_combined_sets);
  cluster_test!(sets, should_smove_members);
}

mod sorted_sets {

  cluster_test!(sorted_sets, should_add_and_read_members);
  cluster_test!(sorted_sets, should_add_with_options);
  cluster_test!(sorted_sets, should_store_union_in_one_slot);
  cluster_test!(sorted_sets, should_reject_store_across_slots);
}

mod lua {

  cluster_test!(lua, should_load_script);
  cluster_test!(lua, should_evalsha_echo_script);
  cluster_test!(lua, should_eval_echo_script);
  cluster_test_panic!(lua, should_error_evalsha_missing_script);
}

mod multi {

  cluster_test_panic!(multi, should_fail_multi_in_cluster);
}

mod pipeline {

  cluster_test!(pipeline, should_return_results_in_order);
  cluster_test!(pipeline, should_map_queued_values_to_none);
  cluster_test!(pipeline, should_carry_partial_results_on_failure);
  cluster_test!(pipeline, should_close_without_open_pipeline);
  cluster_test!(pipeline, should_reject_emulation_in_pipeline);
}

mod pubsub {

  cluster_test!(pubsub, should_publish_and_recv_messages);
  cluster_test!(pubsub, should_psubscribe_and_recv_messages);
  cluster_test!(pubsub, should_track_channels_and_patterns);
}

mod server {

  cluster_test!(server, should_ping_and_echo);
  cluster_test!(server, should_flushall_and_count_keys);
  cluster_test!(server, should_read_time_and_lastsave);
  cluster_test!(server, should_set_and_get_config_on_every_primary);
  cluster_test!(server, should_merge_info_fields_across_primaries);
}

mod cluster {

  cluster_test!(cluster, should_read_cluster_state);
  cluster_test!(cluster, should_follow_moved_after_slot_moves);
  cluster_test!(cluster, should_follow_ask_during_migration);
  cluster_test!(cluster, should_target_single_nodes);
  cluster_test!(cluster, should_execute_on_nodes);
  cluster_test!(cluster, should_fail_ping_when_a_node_is_down);
  cluster_test!(cluster, should_emulate_commands_across_slots);
  cluster_test_panic!(cluster, should_reject_watch_in_cluster);
  cluster_test_panic!(cluster, should_reject_eval_across_slots);
}

mod scanning {

  cluster_test!(scanning, should_scan_keys_by_page);
  cluster_test!(scanning, should_scan_hash_set_and_sorted_set_pages);
  cluster_test!(scanning, should_scan_every_primary);
  cluster_test!(scanning, should_scan_one_node_with_a_hash_tag);
  cluster_test_panic!(scanning, should_error_cluster_scan_page_without_hash_tag);
}
